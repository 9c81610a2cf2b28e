//! Reconnection pacing for endpoint poll loops.

use std::time::Duration;

/// Fixed-delay reconnect policy with an optional attempt ceiling.
///
/// Attempts are unbounded by default; a nonzero `max_attempts` caps the
/// consecutive-failure streak, after which the endpoint signals stop and
/// exits its loop.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    delay: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(delay_seconds: f64, max_attempts: u32) -> Self {
        Self {
            delay: Duration::from_secs_f64(delay_seconds.max(0.0)),
            max_attempts,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// True once the 1-based attempt counter has passed the ceiling.
    pub fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt > self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_by_default() {
        let policy = ReconnectPolicy::new(1.0, 0);
        assert!(!policy.exhausted(1));
        assert!(!policy.exhausted(1_000_000));
    }

    #[test]
    fn ceiling_applies_after_max_attempts() {
        let policy = ReconnectPolicy::new(1.0, 3);
        assert!(!policy.exhausted(1));
        assert!(!policy.exhausted(3));
        assert!(policy.exhausted(4));
    }

    #[test]
    fn negative_delay_clamps_to_zero() {
        let policy = ReconnectPolicy::new(-5.0, 0);
        assert_eq!(policy.delay(), Duration::ZERO);
    }
}
