//! Bounded exponential backoff with jitter for retryable calls.
//!
//! Every external call site wraps itself in [`with_retry`]. Only errors
//! the taxonomy marks retryable are retried; throttling responses that
//! carry a server-suggested wait honor it instead of the computed delay.
//! Exhausting the budget surfaces the last error, which fails the
//! surrounding unit only.

use crate::error::{Result, SyncError};
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry budget and delay curve.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any computed delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based), with jitter.
    ///
    /// A server-suggested `retry_after` overrides the exponential curve.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<u64>) -> Duration {
        if let Some(secs) = retry_after {
            return Duration::from_secs(secs.max(1));
        }

        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.max_delay_ms.max(1));
        // Full jitter keeps concurrent units from retrying in lockstep.
        let jittered = rand::thread_rng().gen_range(exp / 2..=exp);
        Duration::from_millis(jittered)
    }
}

/// Run `call` until it succeeds, the error is not retryable, or the
/// retry budget is spent.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, err.retry_after());
                attempt += 1;
                tracing::debug!(
                    op,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::warn!(op, attempts = attempt + 1, error = %err, "retry budget exhausted");
                }
                return Err(err);
            }
        }
    }
}
