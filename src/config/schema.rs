//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the breaker
//! service. All types derive Serde traits for deserialization from config files.

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Root configuration for the breaker service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BreakerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Sliding window and threshold tunables.
    pub breaker: BreakerSettings,

    /// Remediation executor settings (timeout, retries).
    pub remediation: RemediationConfig,

    /// External control plane that receives stop calls.
    pub control_plane: ControlPlaneConfig,

    /// Where actor snapshots and workflow checkpoints live.
    pub persistence: PersistenceConfig,

    /// Timeout configuration for the HTTP front door.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Circuit tunables shared by every actor in the directory.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Span of the sliding window, measured back from the latest failure.
    /// Accepts "HH:MM:SS" or "<n>ms|s|m|h".
    #[serde(with = "duration::serde_str")]
    pub window_size: Duration,

    /// Number of in-window failures that opens the circuit.
    pub failure_threshold: u32,

    /// Idle time after which a closed, empty actor is dropped from memory.
    /// Zero disables eviction.
    pub idle_eviction_secs: u64,

    /// How often the eviction sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            window_size: Duration::from_secs(60),
            failure_threshold: 20,
            idle_eviction_secs: 3600,
            sweep_interval_secs: 60,
        }
    }
}

/// Remediation executor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Deadline for a single stop call, in seconds.
    pub timeout_secs: u64,

    /// Maximum executions of one workflow before giving up.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
        }
    }
}

/// Control plane endpoint used by the default HTTP stop action.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    /// Base URL; the resource id is appended verbatim.
    pub base_url: String,

    /// Path appended after the resource id.
    pub stop_path: String,

    /// Optional `api-version` query parameter.
    pub api_version: Option<String>,

    /// Name of the environment variable holding a bearer token.
    pub bearer_token_env: Option<String>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            base_url: "https://management.azure.com".to_string(),
            stop_path: "/stop".to_string(),
            api_version: Some("2019-08-01".to_string()),
            bearer_token_env: Some("CONTROL_PLANE_TOKEN".to_string()),
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: StoreBackend,

    /// Root directory for the file backend.
    pub data_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            data_dir: "./data".to_string(),
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Request hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024,
        }
    }
}
