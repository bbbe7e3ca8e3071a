//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_failures_total` (counter): failure reports by outcome
//! - `breaker_transitions_total` (counter): state changes by target state
//! - `breaker_remediations_total` (counter): remediation attempts by result
//! - `breaker_remediation_duration_seconds` (histogram): attempt latency
//! - `breaker_active_circuits` (gauge): circuits resident in memory
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter, so
//!   library code and tests never need a recorder
//! - Labels are low-cardinality; circuit keys are never used as labels

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One failure report, labelled by what the circuit did with it.
pub fn record_failure(outcome: &'static str) {
    metrics::counter!("breaker_failures_total", "outcome" => outcome).increment(1);
}

pub fn record_transition(to: &'static str) {
    metrics::counter!("breaker_transitions_total", "to" => to).increment(1);
}

pub fn record_remediation(result: &'static str, started: Instant) {
    metrics::counter!("breaker_remediations_total", "result" => result).increment(1);
    metrics::histogram!("breaker_remediation_duration_seconds", "result" => result)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_active_circuits(count: usize) {
    metrics::gauge!("breaker_active_circuits").set(count as f64);
}
