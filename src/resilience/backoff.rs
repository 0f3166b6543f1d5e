use std::time::Duration;

use crate::errors::{OrderError, Result};

/// Exponential backoff with full jitter.
///
/// Attempt `i` (zero-based) sleeps `min(cap, U[0, base * 2^i))`. Full
/// jitter spreads concurrent retriers uniformly over the window instead of
/// synchronizing them on the exponential boundary; the cap bounds the
/// worst-case sleep.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    /// Build a policy. Rejects `base < 1ms`, `cap < base` and
    /// `max_attempts == 0`.
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Result<Self> {
        if base < Duration::from_millis(1) {
            return Err(OrderError::Configuration(
                "backoff base must be at least 1ms".to_string(),
            ));
        }
        if cap < base {
            return Err(OrderError::Configuration(
                "backoff cap must not be below base".to_string(),
            ));
        }
        if max_attempts == 0 {
            return Err(OrderError::Configuration(
                "backoff max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            base,
            cap,
            max_attempts,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Jittered delay for the given zero-based attempt number.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base_nanos = self.base.as_nanos() as u64;
        // Saturate the window so large attempt numbers cannot overflow.
        let window = base_nanos.saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
        let jittered = Duration::from_nanos(fastrand::u64(0..window.max(1)));
        jittered.min(self.cap)
    }

    /// Sleep for the attempt's jittered delay, returning `Cancelled` if the
    /// shutdown signal fires first.
    pub async fn sleep(
        &self,
        attempt: u32,
        shutdown: &mut tokio::sync::watch::Receiver<bool>,
    ) -> Result<()> {
        if *shutdown.borrow() {
            return Err(OrderError::Cancelled);
        }
        tokio::select! {
            _ = tokio::time::sleep(self.delay(attempt)) => Ok(()),
            _ = shutdown.changed() => Err(OrderError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_construction() {
        assert!(BackoffPolicy::new(Duration::ZERO, Duration::from_secs(1), 3).is_err());
        assert!(
            BackoffPolicy::new(Duration::from_millis(100), Duration::from_millis(10), 3).is_err()
        );
        assert!(BackoffPolicy::new(Duration::from_millis(10), Duration::from_secs(1), 0).is_err());
    }

    #[test]
    fn delay_never_exceeds_cap() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(50), 10).unwrap();
        for attempt in 0..64 {
            assert!(policy.delay(attempt) <= Duration::from_millis(50));
        }
    }

    #[test]
    fn delay_stays_within_jitter_window() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_secs(60), 10).unwrap();
        for _ in 0..100 {
            // attempt 2 -> window [0, 40ms)
            assert!(policy.delay(2) < Duration::from_millis(40));
        }
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let policy =
            BackoffPolicy::new(Duration::from_millis(10), Duration::from_millis(200), 10).unwrap();
        assert!(policy.delay(u32::MAX) <= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn sleep_observes_shutdown() {
        let policy =
            BackoffPolicy::new(Duration::from_secs(10), Duration::from_secs(10), 1).unwrap();
        let (tx, mut rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), policy.sleep(9, &mut rx)).await;
        assert_eq!(result.unwrap(), Err(OrderError::Cancelled));
    }
}
