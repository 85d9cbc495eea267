use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::clients::RemoteError;

/// Transport-level retry: exponential backoff with jitter.
///
/// Only unclear failures are retried, and the caller always passes the same
/// idempotency key, so a retry can at worst replay a memoized response.
/// Clear business failures return immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retries. Used where the caller owns retrying
    /// (the recovery worker) and by tests.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        let capped = exp.min(self.max_delay);
        if capped.is_zero() {
            return capped;
        }
        // Up to +50% jitter so synchronized retries spread out.
        let jitter_ms = rand::thread_rng().gen_range(0..=capped.as_millis() as u64 / 2);
        capped + Duration::from_millis(jitter_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

/// Runs `op` until it succeeds, fails clearly, or attempts run out.
pub async fn retry_unclear<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_unclear() && attempt + 1 < policy.max_attempts => {
                let delay = policy.backoff(attempt);
                tracing::debug!(attempt, ?delay, error = %e, "retrying unclear remote failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
