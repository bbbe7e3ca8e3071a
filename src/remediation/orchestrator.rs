//! One remediation attempt, safe to run again.
//!
//! # Steps
//! ```text
//! load or create checkpoint
//!     → begin attempt, persist
//!     → announce (first attempt only)
//!     → stop call with timeout
//!     → record outcome, persist
//!     → success notice (first success only)
//! ```
//!
//! # Design Decisions
//! - No retry here; a failed attempt is returned to the executor
//! - Non-idempotent log lines are gated by milestones stored in the checkpoint
//! - A completed workflow still performs the stop call when re-run; the
//!   remote side is expected to treat "stop a stopped resource" as success

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::timeout;

use crate::breaker::{Clock, RemediationRequest};
use crate::observability::metrics;
use crate::persistence::{StateStore, StoreError};
use crate::remediation::action::{ActionError, RemediationAction};
use crate::remediation::checkpoint::{Milestone, WorkflowCheckpoint};

/// Why an attempt failed.
#[derive(Debug, Error)]
pub enum RemediationError {
    /// The control plane answered with a non-success status.
    #[error("Failed to stop resource: {status_code}: {detail}")]
    Failed { status_code: u16, detail: String },

    /// No answer: connection error or timeout.
    #[error("Control plane unreachable: {0}")]
    Unreachable(String),

    /// The checkpoint could not be read or written.
    #[error("Checkpoint store error: {0}")]
    Checkpoint(#[from] StoreError),
}

impl RemediationError {
    pub fn label(&self) -> &'static str {
        match self {
            RemediationError::Failed { .. } => "failed",
            RemediationError::Unreachable(_) => "unreachable",
            RemediationError::Checkpoint(_) => "checkpoint",
        }
    }
}

/// Result of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationOutcome {
    pub execution_id: String,
    /// 1-based attempt number across all runs of this workflow.
    pub attempt: u32,
    /// An earlier attempt had already announced this workflow.
    pub replayed: bool,
}

pub struct RemediationOrchestrator {
    action: Arc<dyn RemediationAction>,
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl RemediationOrchestrator {
    pub fn new(
        action: Arc<dyn RemediationAction>,
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            action,
            store,
            clock,
            call_timeout,
        }
    }

    pub async fn execute(&self, request: &RemediationRequest) -> Result<RemediationOutcome, RemediationError> {
        let started = Instant::now();
        let resource_id = request.resource_id.as_str();

        let mut checkpoint = match self.store.load_checkpoint(&request.execution_id).await? {
            Some(cp) => cp,
            None => WorkflowCheckpoint::new(request.clone(), self.clock.now()),
        };
        let attempt = checkpoint.begin_attempt(self.clock.now());
        let announce = checkpoint.first_time(Milestone::Announced);
        self.store.save_checkpoint(&checkpoint).await?;

        if announce {
            tracing::info!(
                execution_id = %request.execution_id,
                circuit = %request.circuit_key,
                resource_id,
                "Disabling resource ({}) to open circuit.",
                resource_id
            );
        } else {
            tracing::debug!(execution_id = %request.execution_id, attempt, "Re-running remediation");
        }

        let result = match timeout(self.call_timeout, self.action.stop(resource_id)).await {
            Ok(Ok(response)) if response.is_success() => Ok(()),
            Ok(Ok(response)) => Err(RemediationError::Failed {
                status_code: response.status,
                detail: response.body,
            }),
            Ok(Err(ActionError::Transport(msg))) => Err(RemediationError::Unreachable(msg)),
            Err(_) => Err(RemediationError::Unreachable(format!(
                "no response within {:?}",
                self.call_timeout
            ))),
        };

        match result {
            Ok(()) => {
                let notify = checkpoint.first_time(Milestone::Stopped);
                checkpoint.succeed(self.clock.now());
                self.store.save_checkpoint(&checkpoint).await?;

                if notify {
                    tracing::warn!(
                        execution_id = %request.execution_id,
                        resource_id,
                        "Successfully STOPPED resource with Resource ID {}.",
                        resource_id
                    );
                }
                metrics::record_remediation("succeeded", started);

                Ok(RemediationOutcome {
                    execution_id: request.execution_id.clone(),
                    attempt,
                    replayed: !announce,
                })
            }
            Err(err) => {
                tracing::error!(
                    execution_id = %request.execution_id,
                    resource_id,
                    attempt,
                    error = %err,
                    "Remediation attempt failed"
                );
                checkpoint.fail(err.to_string(), self.clock.now());
                if let Err(store_err) = self.store.save_checkpoint(&checkpoint).await {
                    tracing::error!(
                        execution_id = %request.execution_id,
                        error = %store_err,
                        "Could not record failed attempt"
                    );
                }
                metrics::record_remediation(err.label(), started);
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::breaker::{FailureRecord, SystemClock};
    use crate::persistence::MemoryStore;
    use crate::remediation::action::ActionResponse;
    use crate::remediation::checkpoint::WorkflowStatus;

    /// Scripted control plane. Pops one response per call; once the script
    /// is exhausted every call succeeds (the resource is already stopped).
    #[derive(Default)]
    pub(crate) struct ScriptedAction {
        script: Mutex<Vec<Result<ActionResponse, ActionError>>>,
        pub(crate) calls: AtomicU32,
        delay: Option<Duration>,
    }

    impl ScriptedAction {
        pub(crate) fn new(mut script: Vec<Result<ActionResponse, ActionError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                ..Default::default()
            }
        }

        pub(crate) fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RemediationAction for ScriptedAction {
        async fn stop(&self, _resource_id: &str) -> Result<ActionResponse, ActionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.script.lock().unwrap().pop().unwrap_or_else(|| Ok(ActionResponse::ok()))
        }
    }

    pub(crate) fn request(id: &str) -> RemediationRequest {
        RemediationRequest {
            execution_id: id.to_string(),
            circuit_key: "orders".to_string(),
            resource_id: "/sites/app".to_string(),
            triggering_failure: FailureRecord {
                request_id: "r1".to_string(),
                failure_time: Utc::now(),
                instance_id: "i".to_string(),
                resource_id: "/sites/app".to_string(),
            },
        }
    }

    fn orchestrator(action: Arc<ScriptedAction>, store: Arc<MemoryStore>) -> RemediationOrchestrator {
        RemediationOrchestrator::new(action, store, Arc::new(SystemClock::new()), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_replay_succeeds_without_repeating_milestones() {
        let action = Arc::new(ScriptedAction::new(vec![]));
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(action.clone(), store.clone());
        let req = request("orders#1");

        let first = orch.execute(&req).await.unwrap();
        assert_eq!(first.attempt, 1);
        assert!(!first.replayed);

        let second = orch.execute(&req).await.unwrap();
        assert_eq!(second.attempt, 2);
        assert!(second.replayed);

        assert_eq!(action.calls.load(Ordering::SeqCst), 2);
        let cp = store.load_checkpoint("orders#1").await.unwrap().unwrap();
        assert_eq!(cp.status, WorkflowStatus::Succeeded);
        assert_eq!(cp.milestones.len(), 2);
    }

    #[tokio::test]
    async fn test_non_success_status_is_terminal_for_the_attempt() {
        let action = Arc::new(ScriptedAction::new(vec![Ok(ActionResponse {
            status: 403,
            body: "forbidden".to_string(),
        })]));
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(action.clone(), store.clone());

        match orch.execute(&request("orders#1")).await {
            Err(RemediationError::Failed { status_code, detail }) => {
                assert_eq!(status_code, 403);
                assert_eq!(detail, "forbidden");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(action.calls.load(Ordering::SeqCst), 1);

        let cp = store.load_checkpoint("orders#1").await.unwrap().unwrap();
        assert_eq!(cp.status, WorkflowStatus::Failed);
        assert!(cp.has(Milestone::Announced));
        assert!(!cp.has(Milestone::Stopped));
        assert!(cp.last_error.unwrap().contains("403"));
    }

    #[tokio::test]
    async fn test_transport_error_is_unreachable() {
        let action = Arc::new(ScriptedAction::new(vec![Err(ActionError::Transport(
            "connection refused".to_string(),
        ))]));
        let orch = orchestrator(action, Arc::new(MemoryStore::new()));
        assert!(matches!(
            orch.execute(&request("orders#1")).await,
            Err(RemediationError::Unreachable(msg)) if msg.contains("refused")
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let action = Arc::new(ScriptedAction::slow(Duration::from_secs(5)));
        let orch = orchestrator(action, Arc::new(MemoryStore::new()));
        assert!(matches!(
            orch.execute(&request("orders#1")).await,
            Err(RemediationError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_retry_after_failure_is_a_replay() {
        let action = Arc::new(ScriptedAction::new(vec![Ok(ActionResponse {
            status: 500,
            body: String::new(),
        })]));
        let store = Arc::new(MemoryStore::new());
        let orch = orchestrator(action, store.clone());
        let req = request("orders#1");

        assert!(orch.execute(&req).await.is_err());
        let outcome = orch.execute(&req).await.unwrap();
        assert!(outcome.replayed);
        assert_eq!(outcome.attempt, 2);
    }
}
