//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry number `attempt` (1-based): `base_ms * 2^(attempt-1)`,
/// capped at `max_ms`, plus up to 10% jitter so concurrent retries spread out.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_cap() {
        let first = calculate_backoff(1, 500, 10_000).as_millis();
        assert!((500..550).contains(&first));

        let third = calculate_backoff(3, 500, 10_000).as_millis();
        assert!((2_000..2_200).contains(&third));

        let capped = calculate_backoff(40, 500, 10_000).as_millis();
        assert!((10_000..11_000).contains(&capped));
    }

    #[test]
    fn test_zero_attempt_and_tiny_delays() {
        assert_eq!(calculate_backoff(0, 500, 10_000), Duration::ZERO);
        assert_eq!(calculate_backoff(1, 1, 5), Duration::from_millis(1));
    }
}
