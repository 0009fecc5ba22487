//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Exponential backoff for rate-limited calls to the analysis service.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,

    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    /// 1s, 2s, 4s, 8s between five attempts.
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempts`-th failed attempt (1-indexed).
    ///
    /// delay = base_delay * multiplier^(attempts - 1); attempts=0 uses base_delay.
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempts.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_has_reasonable_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.multiplier, 2.0);
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn exponential_backoff_doubles() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = (1..=4).map(|n| policy.next_delay(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
        assert_eq!(policy.next_delay(0), policy.base_delay);
    }
}
