//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Remediation attempt fails:
//!     → backoff.rs (exponential delay with jitter)
//!     → executor retries until max_attempts
//! ```

pub mod backoff;
