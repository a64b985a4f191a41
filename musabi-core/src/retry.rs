//! Bounded retry for idempotent external calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::PipelineError;

/// Retry settings with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.backoff_factor.powi(retry.saturating_sub(1) as i32);
        self.initial_delay.mul_f64(factor)
    }
}

/// Run `f`, retrying only errors marked retryable.
///
/// Validation and non-transient external errors are returned immediately.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut f: F,
) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PipelineError>>,
{
    let mut retry = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                tracing::warn!(
                    operation,
                    attempt = retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                sleep(delay).await;
            }
            Err(e) => {
                if retry > 0 {
                    tracing::error!(operation, attempts = retry + 1, "All attempts failed");
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_factor: 2.0,
        }
    }

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = &AtomicU32::new(0);
        let result = retry_transient(&fast_policy(), "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(PipelineError::transient("openai", "connection reset"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&fast_policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::transient("openai", "503"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&fast_policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::validation("empty content"))
        })
        .await;

        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_external_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), _> = retry_transient(&fast_policy(), "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(PipelineError::external("openai", "HTTP 400: bad prompt"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
