//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, limits, tracing)
//!     → handlers.rs (decode body, build ActorOperation)
//!     → ActorDirectory::dispatch
//!     → response.rs (errors to status codes)
//!     → Send to client
//! ```

pub mod handlers;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
