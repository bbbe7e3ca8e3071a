//! Keyed registry of circuit actors.
//!
//! # Data Flow
//! ```text
//! dispatch(key, op)
//!     → cell for key (created on first use)
//!     → lock cell (one operation per key at a time)
//!     → hydrate actor from store if not resident
//!     → apply op to a copy
//!     → persist copy, then commit it in memory
//!     → hand pending remediation to the dispatcher, clear outbox, persist
//! ```
//!
//! # Design Decisions
//! - A failed write leaves the resident actor untouched
//! - The remediation request travels inside the snapshot until the
//!   dispatcher has it, so a crash between the two writes loses nothing
//! - Eviction only removes cells no operation holds

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::TimeDelta;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::breaker::actor::{AddFailureOutcome, CircuitActor};
use crate::breaker::clock::Clock;
use crate::breaker::types::{BreakerError, BreakerResult, CircuitState, FailureSignal};
use crate::config::BreakerSettings;
use crate::observability::metrics;
use crate::persistence::StateStore;
use crate::remediation::RemediationDispatcher;

type Cell = Arc<Mutex<Option<CircuitActor>>>;

/// An operation addressed to one circuit.
#[derive(Debug, Clone)]
pub enum ActorOperation {
    AddFailure(FailureSignal),
    Open,
    Close,
    Inspect,
}

/// What an operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationOutcome {
    Recorded,
    Duplicate,
    Opened,
    RejectedOpen,
    /// Forced open or closed.
    Transitioned,
    /// Forced into the state it was already in.
    Unchanged,
    Inspected,
}

impl OperationOutcome {
    fn label(&self) -> &'static str {
        match self {
            OperationOutcome::Recorded => "recorded",
            OperationOutcome::Duplicate => "duplicate",
            OperationOutcome::Opened => "opened",
            OperationOutcome::RejectedOpen => "rejected_open",
            OperationOutcome::Transitioned => "transitioned",
            OperationOutcome::Unchanged => "unchanged",
            OperationOutcome::Inspected => "inspected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationReport {
    pub circuit_key: String,
    pub outcome: OperationOutcome,
    /// The failure was stored in the window.
    pub accepted: bool,
    pub state: CircuitState,
    pub window_count: usize,
    pub failure_threshold: u32,
    /// Set when this operation opened the circuit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
}

/// Persisted view of one circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitSummary {
    pub key: String,
    pub state: CircuitState,
    pub window_count: usize,
    pub trip_count: u64,
    pub remediation_pending: bool,
}

impl From<&CircuitActor> for CircuitSummary {
    fn from(actor: &CircuitActor) -> Self {
        Self {
            key: actor.key().to_string(),
            state: actor.state(),
            window_count: actor.window().count(),
            trip_count: actor.trip_count(),
            remediation_pending: actor.outbox().is_some(),
        }
    }
}

pub struct ActorDirectory {
    cells: DashMap<String, Cell>,
    settings: ArcSwap<BreakerSettings>,
    store: Arc<dyn StateStore>,
    dispatcher: RemediationDispatcher,
    clock: Arc<dyn Clock>,
}

impl ActorDirectory {
    pub fn new(
        settings: BreakerSettings,
        store: Arc<dyn StateStore>,
        dispatcher: RemediationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cells: DashMap::new(),
            settings: ArcSwap::from_pointee(settings),
            store,
            dispatcher,
            clock,
        }
    }

    /// Apply one operation to the circuit named `key`.
    pub async fn dispatch(&self, key: &str, op: ActorOperation) -> BreakerResult<OperationReport> {
        if key.trim().is_empty() {
            return Err(BreakerError::InvalidArgument("resource key is required".to_string()));
        }

        let cell = self.cell(key);
        let mut slot = cell.lock().await;

        let current = match slot.take() {
            Some(actor) => actor,
            None => self.hydrate(key).await?,
        };
        let now = self.clock.now();
        let threshold = self.settings.load().failure_threshold;

        let is_failure = matches!(op, ActorOperation::AddFailure(_));
        let mut next = current.clone();
        let applied = match op {
            ActorOperation::AddFailure(signal) => signal
                .into_record(now)
                .and_then(|record| next.add_failure(record, threshold, now))
                .map(|outcome| match outcome {
                    AddFailureOutcome::Recorded { .. } => (OperationOutcome::Recorded, true),
                    AddFailureOutcome::Duplicate { .. } => (OperationOutcome::Duplicate, false),
                    AddFailureOutcome::Opened { .. } => (OperationOutcome::Opened, true),
                    AddFailureOutcome::RejectedOpen { .. } => (OperationOutcome::RejectedOpen, false),
                }),
            ActorOperation::Open => Ok(if next.open_circuit(now) {
                (OperationOutcome::Transitioned, true)
            } else {
                (OperationOutcome::Unchanged, false)
            }),
            ActorOperation::Close => Ok(if next.close_circuit(now) {
                (OperationOutcome::Transitioned, true)
            } else {
                (OperationOutcome::Unchanged, false)
            }),
            ActorOperation::Inspect => Ok((OperationOutcome::Inspected, false)),
        };

        let (outcome, mutated) = match applied {
            Ok(applied) => applied,
            Err(e) => {
                *slot = Some(current);
                return Err(e);
            }
        };

        if mutated {
            if let Err(e) = self.store.save_circuit(&next).await {
                tracing::error!(circuit = key, error = %e, "Failed to persist circuit; operation discarded");
                *slot = Some(current);
                return Err(e.into());
            }
        }

        if is_failure {
            metrics::record_failure(outcome.label());
        }
        if current.state() != next.state() {
            metrics::record_transition(next.state().as_str());
        }

        next.touch(now);
        let execution_id = next.outbox().map(|r| r.execution_id.clone());
        let actor = self.flush_outbox(next).await;

        let report = OperationReport {
            circuit_key: key.to_string(),
            outcome,
            accepted: matches!(outcome, OperationOutcome::Recorded | OperationOutcome::Opened),
            state: actor.state(),
            window_count: actor.window().count(),
            failure_threshold: threshold,
            execution_id: if outcome == OperationOutcome::Opened { execution_id } else { None },
        };
        *slot = Some(actor);
        Ok(report)
    }

    /// Load every persisted circuit and re-submit remediations that never
    /// reached the dispatcher. Returns how many were re-submitted.
    pub async fn recover(&self) -> BreakerResult<usize> {
        let mut resubmitted = 0;
        for actor in self.store.list_circuits().await? {
            let key = actor.key().to_string();
            let cell = self.cell(&key);
            let mut slot = cell.lock().await;
            if slot.is_some() {
                continue;
            }

            let pending = actor.outbox().is_some();
            let actor = self.flush_outbox(actor).await;
            if pending && actor.outbox().is_none() {
                resubmitted += 1;
            }
            *slot = Some(actor);
        }

        tracing::info!(
            circuits = self.cells.len(),
            resubmitted,
            "Circuit directory recovered"
        );
        metrics::record_active_circuits(self.cells.len());
        Ok(resubmitted)
    }

    /// Every persisted circuit, sorted by key.
    pub async fn circuits(&self) -> BreakerResult<Vec<CircuitSummary>> {
        let mut summaries: Vec<_> = self
            .store
            .list_circuits()
            .await?
            .iter()
            .map(CircuitSummary::from)
            .collect();
        summaries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(summaries)
    }

    /// Drop idle actors from memory. Returns how many were evicted.
    ///
    /// Empty, never-tripped circuits also lose their store record. That
    /// delete runs under the cell lock and before the entry leaves the map,
    /// so an operation on the same key either waits for it or starts from
    /// the record it left behind.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let now = self.clock.now();
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let cells: Vec<(String, Cell)> = self
            .cells
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut evicted = 0;
        for (key, cell) in cells {
            // A busy cell is not idle.
            let Ok(slot) = cell.try_lock() else {
                continue;
            };
            let forget = match slot.as_ref() {
                Some(actor) if actor.is_idle(now, ttl) => {
                    actor.window().is_empty() && actor.trip_count() == 0
                }
                Some(_) => continue,
                None => false,
            };

            if forget {
                if let Err(e) = self.store.remove_circuit(&key).await {
                    tracing::warn!(circuit = %key, error = %e, "Failed to remove empty circuit record");
                    continue;
                }
            }

            // The map and this loop hold one reference each; any other holder
            // is an operation waiting on the lock, which keeps the cell.
            let removed = self.cells.remove_if(&key, |_, current| {
                Arc::ptr_eq(current, &cell) && Arc::strong_count(current) == 2
            });
            drop(slot);
            if removed.is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            tracing::debug!(evicted, remaining = self.cells.len(), "Evicted idle circuits");
            metrics::record_active_circuits(self.cells.len());
        }
        evicted
    }

    /// Swap the live settings. The threshold applies to the next failure;
    /// a new window size only applies to circuits created afterwards.
    pub fn update_settings(&self, settings: BreakerSettings) {
        let previous = self.settings.load();
        if previous.window_size != settings.window_size {
            tracing::warn!(
                old = ?previous.window_size,
                new = ?settings.window_size,
                "Window size changed; existing circuits keep their window"
            );
        }
        tracing::info!(
            failure_threshold = settings.failure_threshold,
            "Breaker settings updated"
        );
        self.settings.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<BreakerSettings> {
        self.settings.load_full()
    }

    /// Number of circuits resident in memory.
    pub fn resident(&self) -> usize {
        self.cells.len()
    }

    /// Periodically evict idle circuits until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let settings = self.settings();
        if settings.idle_eviction_secs == 0 {
            tracing::info!("Idle circuit eviction disabled");
            return;
        }

        let mut ticker = tokio::time::interval(Duration::from_secs(settings.sweep_interval_secs));
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ttl = Duration::from_secs(self.settings().idle_eviction_secs);
                    self.evict_idle(ttl).await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Circuit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn cell(&self, key: &str) -> Cell {
        if let Some(cell) = self.cells.get(key) {
            return cell.value().clone();
        }
        let cell = self
            .cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .value()
            .clone();
        metrics::record_active_circuits(self.cells.len());
        cell
    }

    async fn hydrate(&self, key: &str) -> BreakerResult<CircuitActor> {
        match self.store.load_circuit(key).await? {
            Some(actor) => {
                tracing::debug!(circuit = key, state = actor.state().as_str(), "Circuit hydrated");
                Ok(actor)
            }
            None => Ok(CircuitActor::new(key, self.settings.load().window_size)),
        }
    }

    /// Hand a pending remediation to the dispatcher and persist the cleared
    /// outbox. On any failure the outbox stays and is retried on the next
    /// operation for this key or by `recover`.
    async fn flush_outbox(&self, actor: CircuitActor) -> CircuitActor {
        let Some(request) = actor.outbox().cloned() else {
            return actor;
        };

        if let Err(e) = self.dispatcher.submit(&request).await {
            tracing::error!(
                circuit = actor.key(),
                execution_id = %request.execution_id,
                error = %e,
                "Failed to submit remediation; will retry"
            );
            return actor;
        }

        let mut cleared = actor.clone();
        cleared.clear_outbox();
        match self.store.save_circuit(&cleared).await {
            Ok(()) => cleared,
            Err(e) => {
                tracing::error!(
                    circuit = actor.key(),
                    error = %e,
                    "Failed to persist cleared outbox; will retry"
                );
                actor
            }
        }
    }
}
