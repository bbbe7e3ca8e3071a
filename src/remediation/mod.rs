//! Remediation subsystem.
//!
//! # Data Flow
//! ```text
//! circuit opens
//!     → executor.rs (dispatcher writes Pending checkpoint, enqueues id)
//!     → orchestrator.rs (one attempt: announce, stop, record)
//!     → action.rs (control-plane stop call)
//!     → checkpoint.rs (status, attempts, milestones; persisted each step)
//! ```
//!
//! # Design Decisions
//! - Workflows are keyed by a deterministic execution id, so a re-submitted
//!   request after a crash finds its existing checkpoint
//! - The circuit stays open regardless of the remediation outcome

pub mod action;
pub mod checkpoint;
pub mod executor;
pub mod orchestrator;

pub use action::{ActionError, ActionResponse, HttpStopAction, RemediationAction};
pub use checkpoint::{Milestone, WorkflowCheckpoint, WorkflowStatus};
pub use executor::{remediation_queue, RemediationDispatcher, RemediationExecutor};
pub use orchestrator::{RemediationError, RemediationOrchestrator, RemediationOutcome};
