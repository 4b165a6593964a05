//! Exponential backoff over [`ClientError::Transient`]/[`ClientError::Http`]
//! and [`ClientError::RateLimited`], mirroring the original crawler's
//! `fetch_page` retry loop but generalised to any of the three client calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::client::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub rate_limit_backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base_ms: u64, rate_limit_backoff_base_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_base_ms,
            rate_limit_backoff_base_ms,
        }
    }

    fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let base = if rate_limited {
            self.rate_limit_backoff_base_ms
        } else {
            self.backoff_base_ms
        };
        Duration::from_millis(base.saturating_mul(1u64 << attempt.min(6)))
    }
}

/// Retries `op` up to `policy.max_attempts` times. Only
/// [`ClientError::Transient`], [`ClientError::Http`] and
/// [`ClientError::RateLimited`] are retried; `Upstream` and `EmptyResponse`
/// are treated as permanent failures of that call.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 >= policy.max_attempts => return Err(err),
            Err(err @ (ClientError::Transient(_) | ClientError::Http(_))) => {
                let delay = policy.delay_for(attempt, false);
                warn!(%label, attempt, ?delay, error = %err, "transient failure, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err @ ClientError::RateLimited(_)) => {
                let delay = policy.delay_for(attempt, true);
                warn!(%label, attempt, ?delay, error = %err, "rate limited, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 1, 1);

        let result = with_retry(policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ClientError::Transient("boom".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, 1, 1);
        let result: ClientResult<()> =
            with_retry(policy, "test", || async { Err(ClientError::Transient("boom".to_string())) }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn upstream_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, 1, 1);
        let result: ClientResult<()> = with_retry(policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ClientError::Upstream("bad request".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
