//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open store → Build executor → Build directory → Recover → Spawn tasks
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Stop executor and sweeper → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: store first, recovery before the listener accepts
//! - Unfinished remediations are left in their checkpoints and resumed on
//!   the next start

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{start, StartupError, Services};
