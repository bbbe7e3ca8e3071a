//! Durable circuit breaker with automated remediation.

pub mod admin;
pub mod breaker;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod persistence;
pub mod remediation;
pub mod resilience;

pub use breaker::{ActorDirectory, ActorOperation, BreakerError, FailureSignal, OperationReport};
pub use config::BreakerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
