use std::time::Duration;

/// Delay before retry number `retry_count` (0-indexed): `base * 2^retry_count`,
/// saturating instead of overflowing.
pub fn retry_delay(retry_count: u32, base: Duration) -> Duration {
    let multiplier = 2_u32.saturating_pow(retry_count);
    base.saturating_mul(multiplier)
}

/// Like [`retry_delay`], but never longer than `cap`.
pub fn capped_delay(retry_count: u32, base: Duration, cap: Duration) -> Duration {
    retry_delay(retry_count, base).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_each_retry() {
        let base = Duration::from_millis(100);
        assert_eq!(retry_delay(0, base), Duration::from_millis(100));
        assert_eq!(retry_delay(1, base), Duration::from_millis(200));
        assert_eq!(retry_delay(3, base), Duration::from_millis(800));
    }

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(retry_delay(10, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let delay = retry_delay(64, Duration::from_secs(u64::MAX / 2));
        assert_eq!(delay, Duration::MAX);
    }

    #[test]
    fn cap_applies() {
        let cap = Duration::from_secs(5);
        assert_eq!(capped_delay(1, Duration::from_secs(1), cap), Duration::from_secs(2));
        assert_eq!(capped_delay(10, Duration::from_secs(1), cap), cap);
    }
}
