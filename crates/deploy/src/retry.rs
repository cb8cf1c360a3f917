//! Bounded exponential backoff for session creation and chunk retries.

use std::time::Duration;

/// Retry schedule: bounded attempts, exponential delay with a cap and
/// ±25% jitter to avoid thundering herd against a struggling server.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// True if another attempt is allowed after `attempt` failures
    /// (`attempt` is 1-based: 1 = the first attempt just failed).
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before retry number `attempt + 1`, jittered.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exp);
        let capped = secs.min(self.max_delay.as_secs_f64());

        // ±25% jitter off the subsecond clock.
        let jitter = capped * 0.25;
        let offset = (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos() as f64
            / u32::MAX as f64)
            * 2.0
            - 1.0;
        Duration::from_secs_f64((capped + jitter * offset).max(0.01))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_max_attempts() {
        let policy = RetryPolicy {
            max_attempts: 3,
            ..Default::default()
        };
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
        assert!(!policy.allows_retry(10));
    }

    #[test]
    fn delays_grow_up_to_the_cap() {
        let policy = RetryPolicy {
            max_attempts: 20,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
        };

        // Jitter is ±25%, so compare against generous bounds.
        let d1 = policy.delay_for_attempt(1);
        assert!(d1 >= Duration::from_millis(75) && d1 <= Duration::from_millis(125));

        let d4 = policy.delay_for_attempt(4);
        assert!(d4 >= Duration::from_millis(600), "got {d4:?}");

        let d20 = policy.delay_for_attempt(20);
        assert!(d20 <= Duration::from_millis(6250), "got {d20:?}");
    }

    #[test]
    fn delay_is_never_zero() {
        let policy = RetryPolicy {
            initial_delay: Duration::ZERO,
            ..Default::default()
        };
        assert!(policy.delay_for_attempt(1) > Duration::ZERO);
    }
}
