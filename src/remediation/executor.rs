//! Remediation queue and the task that drains it.
//!
//! # Data Flow
//! ```text
//! ActorDirectory
//!     → RemediationDispatcher::submit (Pending checkpoint, then enqueue id)
//!     → RemediationExecutor::run (one task per execution id)
//!     → RemediationOrchestrator::execute, retried with backoff
//! ```
//!
//! # Design Decisions
//! - The queue carries execution ids only; the checkpoint is the payload
//! - An id already being driven is not started twice
//! - Unfinished checkpoints are re-enqueued when the executor starts

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, mpsc};

use crate::breaker::{Clock, RemediationRequest};
use crate::config::RemediationConfig;
use crate::persistence::{StateStore, StoreError};
use crate::remediation::checkpoint::WorkflowCheckpoint;
use crate::remediation::orchestrator::RemediationOrchestrator;
use crate::resilience::backoff::calculate_backoff;

/// Create a connected dispatcher and receiver.
pub fn remediation_queue(
    store: Arc<dyn StateStore>,
    clock: Arc<dyn Clock>,
) -> (RemediationDispatcher, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RemediationDispatcher { store, tx, clock }, rx)
}

/// Producer side of the remediation queue.
#[derive(Clone)]
pub struct RemediationDispatcher {
    store: Arc<dyn StateStore>,
    tx: mpsc::UnboundedSender<String>,
    clock: Arc<dyn Clock>,
}

impl RemediationDispatcher {
    /// Durably record the request and enqueue it.
    ///
    /// Returns `false` when a checkpoint with this execution id already
    /// exists; that workflow is owned by whoever created it, or by
    /// `resume` after a restart.
    pub async fn submit(&self, request: &RemediationRequest) -> Result<bool, StoreError> {
        if self.store.load_checkpoint(&request.execution_id).await?.is_some() {
            tracing::debug!(execution_id = %request.execution_id, "Remediation already submitted");
            return Ok(false);
        }

        let checkpoint = WorkflowCheckpoint::new(request.clone(), self.clock.now());
        self.store.save_checkpoint(&checkpoint).await?;

        self.tx
            .send(request.execution_id.clone())
            .map_err(|_| StoreError::Unavailable("remediation executor is not running".to_string()))?;

        tracing::info!(
            execution_id = %request.execution_id,
            circuit = %request.circuit_key,
            "Remediation submitted"
        );
        Ok(true)
    }
}

pub struct RemediationExecutor {
    orchestrator: Arc<RemediationOrchestrator>,
    store: Arc<dyn StateStore>,
    rx: mpsc::UnboundedReceiver<String>,
    config: RemediationConfig,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl RemediationExecutor {
    pub fn new(
        orchestrator: Arc<RemediationOrchestrator>,
        store: Arc<dyn StateStore>,
        rx: mpsc::UnboundedReceiver<String>,
        config: RemediationConfig,
    ) -> Self {
        Self {
            orchestrator,
            store,
            rx,
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Resume unfinished work, then drain the queue until shutdown.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(max_attempts = self.config.max_attempts, "Remediation executor starting");

        match self.resume().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Resumed unfinished remediations"),
            Err(e) => tracing::error!(error = %e, "Failed to list remediation checkpoints"),
        }

        loop {
            tokio::select! {
                next = self.rx.recv() => match next {
                    Some(execution_id) => self.spawn(execution_id),
                    None => break,
                },
                _ = shutdown.recv() => {
                    tracing::info!("Remediation executor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Start every checkpoint that still has attempts left.
    async fn resume(&self) -> Result<usize, StoreError> {
        let mut resumed = 0;
        for checkpoint in self.store.list_checkpoints().await? {
            if !checkpoint.is_terminal(self.config.max_attempts) {
                self.spawn(checkpoint.execution_id);
                resumed += 1;
            }
        }
        Ok(resumed)
    }

    fn spawn(&self, execution_id: String) {
        if !lock_in_flight(&self.in_flight).insert(execution_id.clone()) {
            tracing::debug!(execution_id = %execution_id, "Remediation already in flight");
            return;
        }

        let orchestrator = self.orchestrator.clone();
        let store = self.store.clone();
        let config = self.config.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            drive(&orchestrator, store.as_ref(), &config, &execution_id).await;
            lock_in_flight(&in_flight).remove(&execution_id);
        });
    }
}

/// The set stays usable after a panic elsewhere; losing it would strand
/// queued execution ids until the next restart.
fn lock_in_flight(in_flight: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    in_flight.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
        tracing::error!("In-flight remediation set was poisoned; recovering it");
        poisoned.into_inner()
    })
}

/// Run one workflow to completion or until its attempts are used up.
async fn drive(
    orchestrator: &RemediationOrchestrator,
    store: &dyn StateStore,
    config: &RemediationConfig,
    execution_id: &str,
) {
    let checkpoint = match store.load_checkpoint(execution_id).await {
        Ok(Some(cp)) => cp,
        Ok(None) => {
            tracing::warn!(execution_id, "No checkpoint for queued remediation");
            return;
        }
        Err(e) => {
            tracing::error!(execution_id, error = %e, "Failed to load remediation checkpoint");
            return;
        }
    };
    if checkpoint.is_terminal(config.max_attempts) {
        return;
    }

    let mut attempts = checkpoint.attempts;
    loop {
        match orchestrator.execute(&checkpoint.request).await {
            Ok(outcome) => {
                tracing::info!(
                    execution_id,
                    attempt = outcome.attempt,
                    replayed = outcome.replayed,
                    "Remediation completed"
                );
                return;
            }
            Err(e) => {
                attempts += 1;
                if attempts >= config.max_attempts {
                    tracing::error!(
                        execution_id,
                        attempts,
                        error = %e,
                        "Remediation gave up; resource must be stopped manually"
                    );
                    return;
                }
                let delay = calculate_backoff(attempts, config.base_delay_ms, config.max_delay_ms);
                tracing::info!(execution_id, attempt = attempts, delay = ?delay, "Retrying remediation");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use crate::breaker::SystemClock;
    use crate::lifecycle::Shutdown;
    use crate::persistence::MemoryStore;
    use crate::remediation::action::ActionResponse;
    use crate::remediation::checkpoint::WorkflowStatus;
    use crate::remediation::orchestrator::tests::{request, ScriptedAction};

    fn config(max_attempts: u32) -> RemediationConfig {
        RemediationConfig {
            timeout_secs: 1,
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    fn server_error() -> Result<ActionResponse, crate::remediation::ActionError> {
        Ok(ActionResponse { status: 500, body: "busy".to_string() })
    }

    struct Harness {
        store: Arc<MemoryStore>,
        action: Arc<ScriptedAction>,
        dispatcher: RemediationDispatcher,
        shutdown: Shutdown,
    }

    fn start(action: ScriptedAction, store: Arc<MemoryStore>, max_attempts: u32) -> Harness {
        start_with(action, store, max_attempts, |_| {})
    }

    fn start_with(
        action: ScriptedAction,
        store: Arc<MemoryStore>,
        max_attempts: u32,
        before_run: impl FnOnce(&RemediationExecutor),
    ) -> Harness {
        let action = Arc::new(action);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        let orchestrator = Arc::new(RemediationOrchestrator::new(
            action.clone(),
            store.clone(),
            clock.clone(),
            Duration::from_millis(200),
        ));
        let (dispatcher, rx) = remediation_queue(store.clone(), clock);
        let executor = RemediationExecutor::new(orchestrator, store.clone(), rx, config(max_attempts));
        before_run(&executor);
        let shutdown = Shutdown::new();
        tokio::spawn(executor.run(shutdown.subscribe()));
        Harness { store, action, dispatcher, shutdown }
    }

    async fn wait_for(store: &MemoryStore, id: &str, done: impl Fn(&WorkflowCheckpoint) -> bool) -> WorkflowCheckpoint {
        for _ in 0..200 {
            if let Some(cp) = store.load_checkpoint(id).await.unwrap() {
                if done(&cp) {
                    return cp;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("checkpoint {} never settled", id);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let h = start(
            ScriptedAction::new(vec![server_error(), server_error()]),
            Arc::new(MemoryStore::new()),
            3,
        );
        assert!(h.dispatcher.submit(&request("orders#1")).await.unwrap());

        let cp = wait_for(&h.store, "orders#1", |cp| cp.status == WorkflowStatus::Succeeded).await;
        assert_eq!(cp.attempts, 3);
        assert_eq!(h.action.calls.load(Ordering::SeqCst), 3);
        h.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let h = start(
            ScriptedAction::new(vec![server_error(), server_error(), server_error()]),
            Arc::new(MemoryStore::new()),
            2,
        );
        h.dispatcher.submit(&request("orders#1")).await.unwrap();

        let cp = wait_for(&h.store, "orders#1", |cp| cp.is_terminal(2)).await;
        assert_eq!(cp.status, WorkflowStatus::Failed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.action.calls.load(Ordering::SeqCst), 2);
        h.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_submit_is_idempotent() {
        let h = start(ScriptedAction::new(vec![]), Arc::new(MemoryStore::new()), 3);
        assert!(h.dispatcher.submit(&request("orders#1")).await.unwrap());
        assert!(!h.dispatcher.submit(&request("orders#1")).await.unwrap());

        wait_for(&h.store, "orders#1", |cp| cp.status == WorkflowStatus::Succeeded).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.action.calls.load(Ordering::SeqCst), 1);
        h.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_resumes_unfinished_checkpoints() {
        let store = Arc::new(MemoryStore::new());
        let now = chrono::Utc::now();

        let pending = WorkflowCheckpoint::new(request("a#1"), now);
        store.save_checkpoint(&pending).await.unwrap();

        let mut done = WorkflowCheckpoint::new(request("b#1"), now);
        done.begin_attempt(now);
        done.succeed(now);
        store.save_checkpoint(&done).await.unwrap();

        let h = start(ScriptedAction::new(vec![]), store, 3);
        wait_for(&h.store, "a#1", |cp| cp.status == WorkflowStatus::Succeeded).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.action.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.store.load_checkpoint("b#1").await.unwrap().unwrap().attempts, 1);
        h.shutdown.trigger();
    }

    #[tokio::test]
    async fn test_poisoned_in_flight_set_still_runs_work() {
        let h = start_with(ScriptedAction::new(vec![]), Arc::new(MemoryStore::new()), 3, |executor| {
            let in_flight = executor.in_flight.clone();
            let _ = std::thread::spawn(move || {
                let _guard = in_flight.lock().unwrap();
                panic!("poison the in-flight set");
            })
            .join();
            assert!(executor.in_flight.is_poisoned());
        });
        assert!(h.dispatcher.submit(&request("orders#1")).await.unwrap());

        wait_for(&h.store, "orders#1", |cp| cp.status == WorkflowStatus::Succeeded).await;
        assert_eq!(h.action.calls.load(Ordering::SeqCst), 1);
        h.shutdown.trigger();
    }
}
