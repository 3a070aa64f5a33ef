//! Retry policy for remote reads

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{RemoteError, RemoteResult};

/// Bounded retry with exponential delay for idempotent reads.
///
/// An attempt is repeated only when its error is retryable: transport
/// failures and 5xx answers. 4xx answers, 404 included, fail at once.
/// Mutations must not be run through a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each later one
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    /// Whether a failed attempt should be followed by another
    pub fn should_retry(&self, retries_done: u32, error: &RemoteError) -> bool {
        retries_done < self.max_retries && error.is_retryable()
    }

    /// Run `operation`, retrying it per this policy
    pub async fn run<T, F, Fut>(&self, what: &str, mut operation: F) -> RemoteResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let mut retries = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if self.should_retry(retries, &e) => {
                    let delay = self.delay_for(retries);
                    retries += 1;
                    warn!(
                        operation = what,
                        error = %e,
                        retry = retries,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Remote read failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    debug!(operation = what, error = %e, retries, "Remote read failed");
                    return Err(e);
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(250))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::ZERO)
    }

    #[test]
    fn delay_doubles() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = quick(2)
            .run("get_all", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(RemoteError::http(503, "Service Unavailable"))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: RemoteResult<()> = quick(2)
            .run("get_all", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::Transport("reset".into()))
            })
            .await;

        assert!(matches!(result, Err(RemoteError::Transport(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: RemoteResult<()> = quick(2)
            .run("get", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::http(404, "Not Found"))
            })
            .await;

        assert_eq!(result, Err(RemoteError::http(404, "Not Found")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn none_runs_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let _: RemoteResult<()> = RetryPolicy::none()
            .run("get_all", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::Transport("reset".into()))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
