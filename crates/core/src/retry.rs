//! Bounded retry with a fixed inter-attempt delay.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::config::RetryConfig;
use crate::error::EndpointError;

/// Wraps an async operation in bounded attempts.
///
/// The delay is applied between attempts, never before the first one, and
/// never grows. After `max_attempts` consecutive failures the last error
/// propagates unchanged. Success values pass through untouched.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt, no waiting.
    pub fn disabled() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        if config.disable_retry {
            Self::disabled()
        } else {
            Self::new(
                config.max_retries,
                Duration::from_secs_f64(config.delay_seconds.max(0.0)),
            )
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Invoke `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, Fut, F>(&self, mut op: F) -> Result<T, EndpointError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, EndpointError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        attempts = self.max_attempts,
                        error = %e,
                        "maximum retry attempts reached"
                    );
                    return Err(e);
                }
                Err(e) => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_secs = self.delay.as_secs_f64(),
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::RetryConfig;

    /// An operation that fails `failures` times, then succeeds forever.
    fn flaky(failures: u32) -> (Arc<AtomicU32>, impl FnMut() -> SinkLike) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let op = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let ok = n >= failures;
            Box::pin(async move {
                if ok {
                    Ok(n)
                } else {
                    Err(EndpointError::transient("not yet"))
                }
            }) as SinkLike
        };
        (calls, op)
    }

    type SinkLike =
        std::pin::Pin<Box<dyn std::future::Future<Output = Result<u32, EndpointError>> + Send>>;

    #[tokio::test]
    async fn succeeds_first_try_without_sleeping() {
        let (calls, op) = flaky(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(60));

        let started = tokio::time::Instant::now();
        let result = policy.run(op).await.unwrap();
        assert_eq!(result, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn k_failures_then_success_makes_k_plus_one_attempts() {
        let (calls, op) = flaky(2);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let started = tokio::time::Instant::now();
        let result = policy.run(op).await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Exactly two sleeps of one second.
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_propagates_the_last_error() {
        let (calls, op) = flaky(10);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let err = policy.run(op).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn disabled_makes_exactly_one_attempt() {
        let (calls, op) = flaky(10);
        let policy = RetryPolicy::from_config(&RetryConfig {
            disable_retry: true,
            max_retries: 5,
            delay_seconds: 9.0,
        });

        let err = policy.run(op).await.unwrap_err();
        assert_eq!(err.message(), "not yet");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn attempts_clamp_to_at_least_one() {
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert_eq!(policy.max_attempts(), 1);
    }

    #[test]
    fn config_mapping() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            disable_retry: false,
            max_retries: 4,
            delay_seconds: 0.5,
        });
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.delay(), Duration::from_millis(500));
    }
}
