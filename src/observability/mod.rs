//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! breaker, remediation, http:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID is carried as a span field by the HTTP trace layer
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
