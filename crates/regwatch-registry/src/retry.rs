//! Retry of rate-limited registry calls.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::error::Result;
use crate::registry::Registry;

/// Bounded exponential backoff for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor between retries.
    pub multiplier: u32,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(16),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Returns the delay before retry number `retry` (zero-based).
    ///
    /// A `Retry-After` hint replaces the computed backoff, capped at
    /// `max_delay`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use regwatch_registry::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.delay_for(0, None), Duration::from_secs(1));
    /// assert_eq!(policy.delay_for(3, None), Duration::from_secs(8));
    /// assert_eq!(policy.delay_for(9, None), Duration::from_secs(16));
    /// assert_eq!(policy.delay_for(0, Some(Duration::from_secs(60))), Duration::from_secs(16));
    /// ```
    #[must_use]
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(hint) = retry_after {
            return hint.min(self.max_delay);
        }

        let factor = self.multiplier.saturating_pow(retry);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Runs `call` until it succeeds, fails with a non-rate-limit error, or
    /// the attempts are used up.
    ///
    /// # Errors
    ///
    /// Returns the last error from `call`.
    pub async fn run<T, F, Fut>(&self, operation: &str, registry: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retry = 0;
        loop {
            match call().await {
                Err(e) if e.is_rate_limited() && retry + 1 < self.max_attempts => {
                    let delay = self.delay_for(retry, e.retry_after());
                    warn!(
                        registry,
                        operation,
                        attempt = retry + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                result => return result,
            }
        }
    }
}

/// A [`Registry`] that retries rate-limited calls of the wrapped registry.
#[derive(Debug)]
pub struct RetryingRegistry<R> {
    inner: R,
    policy: RetryPolicy,
}

impl<R: Registry> RetryingRegistry<R> {
    /// Wraps `inner` with `policy`.
    pub const fn new(inner: R, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Returns the wrapped registry.
    pub const fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: Registry> Registry for RetryingRegistry<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        self.policy
            .run("list_tags", self.inner.name(), || self.inner.list_tags(repository))
            .await
    }

    async fn resolve_digest(&self, repository: &str, reference: &str) -> Result<String> {
        self.policy
            .run("resolve_digest", self.inner.name(), || {
                self.inner.resolve_digest(repository, reference)
            })
            .await
    }

    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        self.policy
            .run("fetch_manifest", self.inner.name(), || {
                self.inner.fetch_manifest(repository, reference)
            })
            .await
    }

    async fn fetch_config(&self, repository: &str, reference: &str) -> Result<Vec<u8>> {
        self.policy
            .run("fetch_config", self.inner.name(), || {
                self.inner.fetch_config(repository, reference)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited(retry_after: Option<Duration>) -> RegistryError {
        RegistryError::RateLimited {
            retry_after,
            message: "TOOMANYREQUESTS".to_string(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..6).map(|n| policy.delay_for(n, None).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 16]);
    }

    #[test]
    fn test_retry_after_below_cap_is_honored() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(2, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_until_success() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = RetryPolicy::default()
            .run("list_tags", "registry.example.com", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(rate_limited(None))
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run("resolve_digest", "registry.example.com", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited(Some(Duration::from_millis(10))))
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_does_not_retry_other_errors() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::default()
            .run("resolve_digest", "registry.example.com", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(RegistryError::HttpError {
                    status: 500,
                    message: "boom".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(RegistryError::HttpError { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_policy_makes_one_attempt() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = RetryPolicy::none()
            .run("list_tags", "registry.example.com", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited(None))
            })
            .await;

        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
