//! Client for the fault-breaker HTTP API.

mod client;

pub use client::{BreakerClient, CircuitReport, FailureReport};
