//! Sliding failure window.
//!
//! The window keeps failures keyed by request id and prunes on every fresh
//! insert. The cutoff is anchored to the latest failure time ever inserted,
//! never to wall-clock now, so replaying the same inserts always yields the
//! same contents. A late record with an old timestamp cannot pull the cutoff
//! backwards and cannot evict newer records.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::breaker::types::FailureRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureWindow {
    /// Fixed when the window is constructed.
    span: Duration,
    records: HashMap<String, FailureRecord>,
    max_seen: Option<DateTime<Utc>>,
}

impl FailureWindow {
    pub fn new(span: Duration) -> Self {
        Self {
            span,
            records: HashMap::new(),
            max_seen: None,
        }
    }

    /// Insert a record. Returns `false` and leaves the window untouched when
    /// the request id is already present.
    ///
    /// A fresh record older than the current cutoff is accepted and then
    /// pruned straight away.
    pub fn insert(&mut self, record: FailureRecord) -> bool {
        if self.records.contains_key(&record.request_id) {
            return false;
        }

        let failure_time = record.failure_time;
        self.records.insert(record.request_id.clone(), record);
        self.max_seen = Some(match self.max_seen {
            Some(seen) if seen >= failure_time => seen,
            _ => failure_time,
        });

        if let Some(cutoff) = self.cutoff() {
            self.prune_to(cutoff);
        }
        true
    }

    /// Remove every record with `failure_time < cutoff`. Returns how many went.
    pub fn prune_to(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, r| r.failure_time >= cutoff);
        before - self.records.len()
    }

    /// `max_seen - span`, or `None` before the first insert.
    pub fn cutoff(&self) -> Option<DateTime<Utc>> {
        let seen = self.max_seen?;
        let span = TimeDelta::from_std(self.span).unwrap_or(TimeDelta::MAX);
        Some(seen.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.records.contains_key(request_id)
    }

    pub fn span(&self) -> Duration {
        self.span
    }

    pub fn max_seen(&self) -> Option<DateTime<Utc>> {
        self.max_seen
    }

    pub fn records(&self) -> impl Iterator<Item = &FailureRecord> {
        self.records.values()
    }
}
