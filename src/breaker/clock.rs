//! Time sources.
//!
//! Failure times are caller-supplied; the clock is only used to stamp
//! signals that arrive without one and for bookkeeping timestamps.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// A source of wall-clock timestamps that never goes backwards.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock, clamped so successive readings are non-decreasing.
#[derive(Debug, Default)]
pub struct SystemClock {
    last_micros: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        let wall = Utc::now();
        let wall_micros = wall.timestamp_micros();

        let mut prev = self.last_micros.load(Ordering::Relaxed);
        loop {
            if wall_micros <= prev {
                return DateTime::from_timestamp_micros(prev).unwrap_or(wall);
            }
            match self.last_micros.compare_exchange_weak(
                prev, wall_micros, Ordering::Relaxed, Ordering::Relaxed
            ) {
                Ok(_) => return wall,
                Err(x) => prev = x,
            }
        }
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    micros: AtomicI64,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            micros: AtomicI64::new(start.timestamp_micros()),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.micros.store(to.timestamp_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let delta = by.num_microseconds().unwrap_or(i64::MAX);
        self.micros.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros.load(Ordering::SeqCst)).unwrap_or_default()
    }
}
