//! The external stop/disable call.
//!
//! # Responsibilities
//! - Define the contract integrators implement
//! - Provide an HTTP implementation against a control-plane API
//!
//! # Design Decisions
//! - Stop must be idempotent on the remote side; it may be called again for
//!   the same resource after a crash or retry
//! - The action reports status; deciding what counts as failure and retrying
//!   is left to the orchestrator and executor

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::ControlPlaneConfig;

/// Response from the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub status: u16,
    pub body: String,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { status: 200, body: String::new() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The call never produced a response.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("transport error: {0}")]
    Transport(String),
}

/// Stops or disables a resource.
#[async_trait]
pub trait RemediationAction: Send + Sync {
    async fn stop(&self, resource_id: &str) -> Result<ActionResponse, ActionError>;
}

/// `POST {base_url}{resource_id}{stop_path}` with an optional bearer token.
#[derive(Debug, Clone)]
pub struct HttpStopAction {
    client: reqwest::Client,
    base_url: String,
    stop_path: String,
    api_version: Option<String>,
    bearer_token: Option<String>,
}

impl HttpStopAction {
    /// Build from config. The bearer token is read once from the named
    /// environment variable.
    pub fn new(config: &ControlPlaneConfig, timeout: Duration) -> Result<Self, ActionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ActionError::Transport(e.to_string()))?;

        let bearer_token = config
            .bearer_token_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|token| !token.is_empty());
        if bearer_token.is_none() {
            tracing::warn!("No control plane token configured; stop calls are unauthenticated");
        }

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            stop_path: config.stop_path.clone(),
            api_version: config.api_version.clone(),
            bearer_token,
        })
    }

    pub fn stop_url(&self, resource_id: &str) -> String {
        let sep = if resource_id.starts_with('/') { "" } else { "/" };
        format!("{}{}{}{}", self.base_url, sep, resource_id, self.stop_path)
    }
}

#[async_trait]
impl RemediationAction for HttpStopAction {
    async fn stop(&self, resource_id: &str) -> Result<ActionResponse, ActionError> {
        let mut request = self.client.post(self.stop_url(resource_id));
        if let Some(version) = &self.api_version {
            request = request.query(&[("api-version", version)]);
        }
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ActionError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(ActionResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_url_joins_resource_id() {
        let config = ControlPlaneConfig {
            base_url: "https://cp.example.com/".to_string(),
            stop_path: "/stop".to_string(),
            api_version: None,
            bearer_token_env: None,
        };
        let action = HttpStopAction::new(&config, Duration::from_secs(1)).unwrap();
        assert_eq!(
            action.stop_url("/subscriptions/s/sites/app"),
            "https://cp.example.com/subscriptions/s/sites/app/stop"
        );
        assert_eq!(action.stop_url("app"), "https://cp.example.com/app/stop");
    }

    #[test]
    fn test_success_is_any_2xx() {
        assert!(ActionResponse::ok().is_success());
        assert!(ActionResponse { status: 204, body: String::new() }.is_success());
        assert!(!ActionResponse { status: 409, body: String::new() }.is_success());
    }
}
