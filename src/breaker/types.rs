//! Circuit data types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persistence::StoreError;

/// A stored failure. Immutable once inside a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// Caller-supplied dedup key.
    pub request_id: String,
    pub failure_time: DateTime<Utc>,
    pub instance_id: String,
    /// Resource the remediation action targets.
    pub resource_id: String,
}

/// A failure notification as it arrives from a caller.
///
/// Accepts both camelCase and PascalCase field names. `failureTime` may be
/// omitted, in which case the directory stamps the arrival time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureSignal {
    #[serde(alias = "RequestId")]
    pub request_id: String,

    #[serde(alias = "FailureTime", default)]
    pub failure_time: Option<DateTime<Utc>>,

    #[serde(alias = "InstanceId", default)]
    pub instance_id: String,

    #[serde(alias = "ResourceId")]
    pub resource_id: String,
}

impl FailureSignal {
    pub fn new(
        request_id: impl Into<String>,
        failure_time: DateTime<Utc>,
        instance_id: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            failure_time: Some(failure_time),
            instance_id: instance_id.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Decode a request body. Empty or malformed bodies are caller errors.
    pub fn from_json(body: &[u8]) -> BreakerResult<Self> {
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(BreakerError::InvalidArgument("Request body cannot be empty.".to_string()));
        }
        serde_json::from_slice(body)
            .map_err(|e| BreakerError::InvalidArgument(format!("Malformed failure signal: {}", e)))
    }

    /// Check required fields.
    pub fn validate(&self) -> BreakerResult<()> {
        if self.request_id.trim().is_empty() {
            return Err(BreakerError::InvalidArgument("requestId is required".to_string()));
        }
        if self.resource_id.trim().is_empty() {
            return Err(BreakerError::InvalidArgument("resourceId is required".to_string()));
        }
        Ok(())
    }

    /// Validate and freeze into a record, stamping `now` when no time was given.
    pub fn into_record(self, now: DateTime<Utc>) -> BreakerResult<FailureRecord> {
        self.validate()?;
        Ok(FailureRecord {
            request_id: self.request_id,
            failure_time: self.failure_time.unwrap_or(now),
            instance_id: self.instance_id,
            resource_id: self.resource_id,
        })
    }
}

/// Circuit state. There is no half-open state: only an explicit close
/// brings an open circuit back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CircuitState {
    #[default]
    Closed,
    Open,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
        }
    }
}

/// Work item handed to the remediation executor when a circuit trips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationRequest {
    /// `{circuit_key}#{trip_count}`; stable across crash recovery.
    pub execution_id: String,
    pub circuit_key: String,
    pub resource_id: String,
    pub triggering_failure: FailureRecord,
}

/// Errors returned to callers of the directory.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// Missing or malformed input. Nothing was changed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation could not be persisted. Nothing was changed.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for circuit operations.
pub type BreakerResult<T> = Result<T, BreakerError>;
