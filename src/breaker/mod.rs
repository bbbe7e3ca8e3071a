//! Circuit breaker subsystem.
//!
//! # Data Flow
//! ```text
//! FailureSignal (HTTP or library caller)
//!     → directory.rs (per-key cell, hydrate, persist, dispatch outbox)
//!     → actor.rs (state machine, threshold check)
//!     → window.rs (dedup, sliding-window pruning)
//!
//! clock.rs stamps signals without a failure time.
//! ```
//!
//! # Design Decisions
//! - The actor is plain data; all I/O happens in the directory
//! - No half-open state; an open circuit stays open until closed explicitly
//! - Closing does not clear the window

pub mod actor;
pub mod clock;
pub mod directory;
pub mod types;
pub mod window;

pub use actor::{AddFailureOutcome, CircuitActor};
pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{ActorDirectory, ActorOperation, CircuitSummary, OperationOutcome, OperationReport};
pub use types::{
    BreakerError, BreakerResult, CircuitState, FailureRecord, FailureSignal, RemediationRequest,
};
pub use window::FailureWindow;
