//! Per-key circuit state machine.
//!
//! # State Transitions
//! ```text
//! Closed → Open:   add_failure brings the window count to the threshold
//! Open   → Closed: close_circuit
//! Open   → Open:   add_failure is rejected, window untouched
//! Any    → Open:   open_circuit (never dispatches remediation)
//! ```
//!
//! The actor does no I/O. The directory serializes calls per key, persists
//! the result and dispatches the outbox.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::breaker::types::{
    BreakerError, BreakerResult, CircuitState, FailureRecord, RemediationRequest,
};
use crate::breaker::window::FailureWindow;

/// What `add_failure` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddFailureOutcome {
    /// Stored; the circuit stays closed.
    Recorded { count: usize },
    /// The request id was already in the window.
    Duplicate { count: usize },
    /// Stored and the threshold was reached.
    Opened { count: usize, request: RemediationRequest },
    /// The circuit is open; the failure was not stored.
    RejectedOpen { count: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitActor {
    key: String,
    state: CircuitState,
    window: FailureWindow,
    /// Threshold-driven Open transitions so far.
    trip_count: u64,
    last_transition_at: Option<DateTime<Utc>>,
    /// Remediation request not yet handed to the executor.
    outbox: Option<RemediationRequest>,
    #[serde(skip)]
    last_activity_at: Option<DateTime<Utc>>,
}

impl CircuitActor {
    pub fn new(key: impl Into<String>, window_size: Duration) -> Self {
        Self {
            key: key.into(),
            state: CircuitState::Closed,
            window: FailureWindow::new(window_size),
            trip_count: 0,
            last_transition_at: None,
            outbox: None,
            last_activity_at: None,
        }
    }

    pub fn add_failure(
        &mut self,
        record: FailureRecord,
        failure_threshold: u32,
        now: DateTime<Utc>,
    ) -> BreakerResult<AddFailureOutcome> {
        if record.request_id.trim().is_empty() || record.resource_id.trim().is_empty() {
            return Err(BreakerError::InvalidArgument(
                "failure record needs a request id and a resource id".to_string(),
            ));
        }

        if self.state == CircuitState::Open {
            tracing::warn!(
                circuit = %self.key,
                request_id = %record.request_id,
                "Tried to add additional failure to {} that is already open.",
                self.key
            );
            return Ok(AddFailureOutcome::RejectedOpen { count: self.window.count() });
        }

        let request_id = record.request_id.clone();
        let resource_id = record.resource_id.clone();
        let triggering = record.clone();

        if !self.window.insert(record) {
            tracing::debug!(circuit = %self.key, request_id = %request_id, "Duplicate failure ignored");
            return Ok(AddFailureOutcome::Duplicate { count: self.window.count() });
        }

        let count = self.window.count();
        if count >= failure_threshold as usize {
            tracing::error!(
                circuit = %self.key,
                count,
                failure_threshold,
                "Break this circuit for entity {}!",
                self.key
            );

            self.trip_count += 1;
            let request = RemediationRequest {
                execution_id: format!("{}#{}", self.key, self.trip_count),
                circuit_key: self.key.clone(),
                resource_id,
                triggering_failure: triggering,
            };
            self.state = CircuitState::Open;
            self.last_transition_at = Some(now);
            self.outbox = Some(request.clone());
            return Ok(AddFailureOutcome::Opened { count, request });
        }

        tracing::info!(
            circuit = %self.key,
            count,
            window = ?self.window.span(),
            "The circuit {} currently has {} exceptions in the window of {:?}.",
            self.key,
            count,
            self.window.span()
        );
        Ok(AddFailureOutcome::Recorded { count })
    }

    /// Force the circuit open. Returns whether the state changed.
    pub fn open_circuit(&mut self, now: DateTime<Utc>) -> bool {
        self.transition(CircuitState::Open, now)
    }

    /// Force the circuit closed. The window is kept as is.
    pub fn close_circuit(&mut self, now: DateTime<Utc>) -> bool {
        self.transition(CircuitState::Closed, now)
    }

    fn transition(&mut self, to: CircuitState, now: DateTime<Utc>) -> bool {
        if self.state == to {
            return false;
        }
        tracing::info!(circuit = %self.key, from = ?self.state, to = ?to, "Circuit state forced");
        self.state = to;
        self.last_transition_at = Some(now);
        true
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn window(&self) -> &FailureWindow {
        &self.window
    }

    pub fn trip_count(&self) -> u64 {
        self.trip_count
    }

    pub fn last_transition_at(&self) -> Option<DateTime<Utc>> {
        self.last_transition_at
    }

    pub fn outbox(&self) -> Option<&RemediationRequest> {
        self.outbox.as_ref()
    }

    pub fn clear_outbox(&mut self) {
        self.outbox = None;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity_at = Some(now);
    }

    /// Closed, nothing pending, and untouched for at least `ttl`.
    pub fn is_idle(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        self.state == CircuitState::Closed
            && self.outbox.is_none()
            && self.last_activity_at.map_or(true, |at| now - at >= ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + TimeDelta::seconds(secs)
    }

    fn failure(id: &str, secs: i64) -> FailureRecord {
        FailureRecord {
            request_id: id.to_string(),
            failure_time: at(secs),
            instance_id: "instance".to_string(),
            resource_id: "/sites/app".to_string(),
        }
    }

    fn actor() -> CircuitActor {
        CircuitActor::new("orders", Duration::from_secs(60))
    }

    #[test]
    fn test_counts_incoming_failures() {
        let mut actor = actor();
        let outcome = actor.add_failure(failure("r1", 0), 20, at(0)).unwrap();
        assert_eq!(outcome, AddFailureOutcome::Recorded { count: 1 });
        assert_eq!(actor.state(), CircuitState::Closed);
    }

    #[test]
    fn test_threshold_edge() {
        let mut actor = actor();
        for i in 1..5 {
            let outcome = actor.add_failure(failure(&format!("r{}", i), i), 5, at(i)).unwrap();
            assert!(matches!(outcome, AddFailureOutcome::Recorded { .. }));
            assert_eq!(actor.state(), CircuitState::Closed);
        }

        match actor.add_failure(failure("r5", 5), 5, at(5)).unwrap() {
            AddFailureOutcome::Opened { count, request } => {
                assert_eq!(count, 5);
                assert_eq!(request.execution_id, "orders#1");
                assert_eq!(request.resource_id, "/sites/app");
                assert_eq!(request.triggering_failure.request_id, "r5");
            }
            other => panic!("expected open, got {:?}", other),
        }
        assert_eq!(actor.state(), CircuitState::Open);
        assert_eq!(actor.trip_count(), 1);
        assert!(actor.outbox().is_some());
    }

    #[test]
    fn test_window_eviction_prevents_trip() {
        let mut actor = actor();
        actor.add_failure(failure("a", 0), 2, at(0)).unwrap();
        let outcome = actor.add_failure(failure("b", 70), 2, at(70)).unwrap();
        assert_eq!(outcome, AddFailureOutcome::Recorded { count: 1 });
        assert_eq!(actor.state(), CircuitState::Closed);

        let mut actor = CircuitActor::new("orders", Duration::from_secs(60));
        actor.add_failure(failure("a", 0), 2, at(0)).unwrap();
        let outcome = actor.add_failure(failure("b", 10), 2, at(10)).unwrap();
        assert!(matches!(outcome, AddFailureOutcome::Opened { count: 2, .. }));
    }

    #[test]
    fn test_duplicate_does_not_count() {
        let mut actor = actor();
        actor.add_failure(failure("a", 0), 2, at(0)).unwrap();
        let outcome = actor.add_failure(failure("a", 5), 2, at(5)).unwrap();
        assert_eq!(outcome, AddFailureOutcome::Duplicate { count: 1 });
        assert_eq!(actor.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_circuit_rejects_failures() {
        let mut actor = actor();
        actor.add_failure(failure("a", 0), 2, at(0)).unwrap();
        actor.add_failure(failure("b", 1), 2, at(1)).unwrap();
        actor.clear_outbox();

        let outcome = actor.add_failure(failure("c", 2), 2, at(2)).unwrap();
        assert_eq!(outcome, AddFailureOutcome::RejectedOpen { count: 2 });
        assert!(!actor.window().contains("c"));
        assert!(actor.outbox().is_none());
        assert_eq!(actor.trip_count(), 1);
    }

    #[test]
    fn test_close_keeps_window_and_allows_retrip() {
        let mut actor = actor();
        actor.add_failure(failure("a", 0), 2, at(0)).unwrap();
        actor.add_failure(failure("b", 1), 2, at(1)).unwrap();
        actor.clear_outbox();

        assert!(actor.close_circuit(at(2)));
        assert_eq!(actor.window().count(), 2);

        // Stale entries still count, so one new failure re-trips.
        match actor.add_failure(failure("c", 3), 2, at(3)).unwrap() {
            AddFailureOutcome::Opened { request, .. } => assert_eq!(request.execution_id, "orders#2"),
            other => panic!("expected re-open, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_record_is_invalid() {
        let mut actor = actor();
        let mut record = failure("", 0);
        assert!(matches!(
            actor.add_failure(record.clone(), 2, at(0)),
            Err(BreakerError::InvalidArgument(_))
        ));
        record.request_id = "ok".to_string();
        record.resource_id = " ".to_string();
        assert!(actor.add_failure(record, 2, at(0)).is_err());
        assert_eq!(actor.window().count(), 0);
    }

    #[test]
    fn test_forced_transitions() {
        let mut actor = actor();
        assert!(!actor.close_circuit(at(0)));
        assert!(actor.open_circuit(at(1)));
        assert!(!actor.open_circuit(at(2)));
        assert_eq!(actor.state(), CircuitState::Open);
        assert!(actor.outbox().is_none());
        assert_eq!(actor.trip_count(), 0);
        assert_eq!(actor.last_transition_at(), Some(at(1)));
    }

    #[test]
    fn test_idle_detection() {
        let mut actor = actor();
        actor.touch(at(0));
        let ttl = TimeDelta::seconds(300);
        assert!(!actor.is_idle(at(100), ttl));
        assert!(actor.is_idle(at(300), ttl));
        actor.open_circuit(at(301));
        assert!(!actor.is_idle(at(10_000), ttl));
    }

    #[test]
    fn test_snapshot_round_trip_keeps_window_anchor() {
        let mut actor = actor();
        actor.add_failure(failure("a", 100), 20, at(100)).unwrap();
        let json = serde_json::to_string(&actor).unwrap();
        let restored: CircuitActor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.window().max_seen(), Some(at(100)));
        assert_eq!(restored.window().span(), Duration::from_secs(60));
        assert_eq!(restored.key(), "orders");
    }
}
