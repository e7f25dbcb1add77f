//! Bounded retry with per-attempt timeout.
//!
//! Every upstream and storage call made by the pipeline and the consistency
//! engine goes through [`RetryPolicy::run`], so one stuck call cannot hold a
//! worker forever and transient failures are retried a few times with
//! jittered exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_retry::{
    strategy::{jitter, ExponentialBackoff},
    RetryIf,
};
use tracing::warn;

use crate::errors::UpstreamError;
use prisoner_indexer_repository::{RepositoryError, SearchIndexError};

/// Errors that can be classified for retry.
pub trait Retryable: Display {
    /// Whether retrying the same call may succeed.
    fn is_transient(&self) -> bool;

    /// The error reported when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

impl Retryable for UpstreamError {
    fn is_transient(&self) -> bool {
        UpstreamError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        UpstreamError::Timeout(after.as_millis() as u64)
    }
}

impl Retryable for SearchIndexError {
    fn is_transient(&self) -> bool {
        SearchIndexError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        SearchIndexError::connection(format!("timed out after {} ms", after.as_millis()))
    }
}

impl Retryable for RepositoryError {
    fn is_transient(&self) -> bool {
        RepositoryError::is_transient(self)
    }

    fn timed_out(after: Duration) -> Self {
        RepositoryError::Timeout(format!("{} ms", after.as_millis()))
    }
}

/// Retry settings shared by every call site.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: usize,
    /// Delay before the first retry; later retries double it.
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay.
    pub max_delay: Duration,
    /// Timeout applied to each attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, base_delay: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            attempt_timeout,
            ..Self::default()
        }
    }

    /// Backoff delays between attempts: base, 2 x base, 4 x base, ... with jitter.
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        let half_base = (self.base_delay.as_millis() as u64 / 2).max(1);
        ExponentialBackoff::from_millis(2)
            .factor(half_base)
            .max_delay(self.max_delay)
            .map(jitter)
            .take(self.max_attempts.saturating_sub(1))
    }

    /// Run `action`, retrying transient failures.
    ///
    /// Non-transient errors are returned immediately. When all attempts fail
    /// the last error is returned.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut action: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable,
    {
        let attempt_timeout = self.attempt_timeout;

        RetryIf::spawn(
            self.strategy(),
            || {
                let attempt = action();
                async move {
                    match tokio::time::timeout(attempt_timeout, attempt).await {
                        Ok(result) => result,
                        Err(_) => Err(E::timed_out(attempt_timeout)),
                    }
                }
            },
            |error: &E| {
                let transient = error.is_transient();
                if transient {
                    warn!(operation = operation, error = %error, "Transient failure, retrying");
                }
                transient
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried_until_success() {
        let calls = AtomicUsize::new(0);

        let result: Result<u32, UpstreamError> = fast_policy(3)
            .run("test", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(UpstreamError::transport("connection reset"))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), UpstreamError> = fast_policy(3)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::Status {
                    status: 503,
                    body: "busy".to_string(),
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_fail_immediately() {
        let calls = AtomicUsize::new(0);

        let result: Result<(), SearchIndexError> = fast_policy(5)
            .run("test", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SearchIndexError::validation("bad request"))
            })
            .await;

        assert!(matches!(result, Err(SearchIndexError::ValidationError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(10));

        let result: Result<(), UpstreamError> = policy
            .run("test", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(UpstreamError::Timeout(10))));
    }
}
