use std::time::Duration;

/// Delay before retry number `attempt` (1-indexed): `unit * attempt`.
///
/// Grows linearly without a cap; bound the retry count to bound the wait.
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

/// Suspends the current request lineage before retry number `attempt`.
///
/// Only the calling future waits; other in-flight requests keep running.
pub async fn wait_before_retry(unit: Duration, attempt: u32) {
    let delay = backoff_delay(unit, attempt);

    #[cfg(feature = "tracing")]
    tracing::debug!("retrying request after {} ms", delay.as_millis());

    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{backoff_delay, wait_before_retry};
    use crate::config::DEFAULT_RETRY_DELAY;

    #[test]
    fn delay_scales_with_attempt() {
        let unit = Duration::from_millis(100);
        assert_eq!(backoff_delay(unit, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(unit, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(unit, 5), Duration::from_millis(500));
    }

    #[test]
    fn second_attempt_waits_twice_the_default_unit() {
        assert_eq!(
            backoff_delay(DEFAULT_RETRY_DELAY, 2),
            Duration::from_millis(4_000)
        );
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        assert_eq!(backoff_delay(Duration::MAX, 3), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_scaled_delay() {
        let start = tokio::time::Instant::now();
        wait_before_retry(Duration::from_millis(250), 3).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(750));
        assert!(elapsed <= Duration::from_millis(751));
    }
}
