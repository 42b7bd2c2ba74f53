// src/ledger/retry.rs
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use crate::error::EngineResult;

/// Backoff parameters for retryable upstream failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 30_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retries_so_far + 1`: base doubled per
    /// attempt, capped, with optional jitter on top.
    fn delay_for(&self, retries_so_far: u32) -> Duration {
        let mut ms = self
            .base_delay_ms
            .saturating_mul(1u64 << retries_so_far.min(10))
            .min(self.max_delay_ms);
        if self.jitter {
            ms += fastrand::u64(0..=ms / 4);
        }
        Duration::from_millis(ms)
    }
}

/// Run `op`, retrying on errors classified retryable (rate limiting and
/// transport failures) until the attempt budget is spent. Every retry is
/// counted into `retries` so scans can surface how degraded the upstream
/// was. Non-retryable errors surface immediately.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    retries: &mut u32,
    mut op: F,
) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    error = %err,
                    attempt = attempt + 1,
                    "{label} failed, retrying in {}ms",
                    delay.as_millis()
                );
                *retries += 1;
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(error = %err, attempts = attempt + 1, "{label} gave up");
                return Err(err);
            }
        }
    }
}
