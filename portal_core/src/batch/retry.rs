use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::RetryConfig;
use crate::error::Result;

/// How many extra attempts an operation gets, and how long to wait between
/// them. The wait grows linearly: `delay * attempt`.
///
/// Every error is retried unless `stop_on_permanent` is set, in which case
/// errors that [`crate::AppError::is_retryable`] rejects end the loop at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
    pub stop_on_permanent: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::ZERO,
            stop_on_permanent: false,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            delay: Duration::from_millis(config.retry_delay_ms),
            stop_on_permanent: false,
        }
    }
}

impl RetryPolicy {
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: Duration::ZERO,
            stop_on_permanent: false,
        }
    }

    pub fn stopping_on_permanent(mut self) -> Self {
        self.stop_on_permanent = true;
        self
    }

    pub fn no_retry() -> Self {
        Self::immediate(0)
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before the zero-based `attempt`; the first attempt never waits.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }
}

/// Runs `op` until it succeeds or the attempts run out, returning the last
/// error. See [`RetryPolicy::stop_on_permanent`] for early exits.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.total_attempts();
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            info!("Retrying {} (attempt {}/{})", name, attempt + 1, attempts);
            let delay = policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.stop_on_permanent && !e.is_retryable() => {
                warn!("{} failed with a permanent error: {}", name, e);
                return Err(e);
            }
            Err(e) if attempt + 1 < attempts => {
                warn!("{} failed (attempt {}): {}", name, attempt + 1, e);
            }
            Err(e) => {
                error!("{} failed after {} attempts: {}", name, attempt + 1, e);
                return Err(e);
            }
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_time() {
        let calls = AtomicU32::new(0);
        let result = retry(&RetryPolicy::default(), "fetch", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AppError>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(&RetryPolicy::default(), "fetch", || async {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            if call < 2 {
                Err(AppError::Operation(format!("flaky {}", call)))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&RetryPolicy::immediate(2), "upload", || async {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Operation(format!("attempt {} failed", call + 1)))
        })
        .await;

        assert_eq!(result.unwrap_err().to_string(), "attempt 3 failed");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_stops_when_asked() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5).stopping_on_permanent();
        let result: Result<()> = retry(&policy, "validate", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::FileRejected("empty".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_every_error_is_retried_by_default() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry(&RetryPolicy::default(), "parse", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            let truncated = serde_json::from_str::<serde_json::Value>("{\"items\": [").unwrap_err();
            Err(AppError::JsonError(truncated))
        })
        .await;

        assert!(matches!(result, Err(AppError::JsonError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_linear_delay() {
        let policy = RetryPolicy {
            max_retries: 2,
            delay: Duration::from_millis(5),
            stop_on_permanent: false,
        };
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(2), Duration::from_millis(10));

        let started = std::time::Instant::now();
        let _: Result<()> = retry(&policy, "slow", || async {
            Err(AppError::Operation("still down".to_string()))
        })
        .await;
        assert!(started.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_retries: 4,
            retry_delay_ms: 250,
        });

        assert_eq!(policy.total_attempts(), 5);
        assert_eq!(policy.delay, Duration::from_millis(250));
        assert!(!policy.stop_on_permanent);
        assert_eq!(RetryPolicy::no_retry().total_attempts(), 1);
    }
}
