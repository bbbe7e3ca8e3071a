//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (threshold > 0, window > 0, timeouts > 0)
//! - Check addresses and URLs parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BreakerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{BreakerConfig, StoreBackend};

/// A single semantic problem with a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &BreakerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be positive"));
    }

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "must be a positive integer"));
    }
    if config.breaker.window_size.is_zero() {
        errors.push(ValidationError::new("breaker.window_size", "must be longer than zero"));
    }
    if config.breaker.idle_eviction_secs > 0 && config.breaker.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "breaker.sweep_interval_secs",
            "must be positive when idle eviction is enabled",
        ));
    }

    if config.remediation.timeout_secs == 0 {
        errors.push(ValidationError::new("remediation.timeout_secs", "must be positive"));
    }
    if config.remediation.max_attempts == 0 {
        errors.push(ValidationError::new("remediation.max_attempts", "must be at least 1"));
    }
    if config.remediation.base_delay_ms > config.remediation.max_delay_ms {
        errors.push(ValidationError::new(
            "remediation.base_delay_ms",
            "must not exceed remediation.max_delay_ms",
        ));
    }

    if url::Url::parse(&config.control_plane.base_url).is_err() {
        errors.push(ValidationError::new(
            "control_plane.base_url",
            format!("'{}' is not a valid URL", config.control_plane.base_url),
        ));
    }

    if config.persistence.backend == StoreBackend::File && config.persistence.data_dir.trim().is_empty() {
        errors.push(ValidationError::new("persistence.data_dir", "required for the file backend"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled && config.admin.api_key.trim().is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
