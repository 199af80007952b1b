//! Retry policy with randomized exponential backoff.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Retry policy for service calls.
///
/// Transient failures are retried up to `max_attempts` total attempts.
/// Before attempt `n + 1` the policy sleeps for a duration drawn uniformly
/// from `[0, base_delay * 2^(n-1)]`, so concurrent clients back off at
/// uncorrelated times.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Backoff ceiling for the first retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// A policy that fails on the first error. Useful in tests.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Run `operation`, retrying while it fails with a transient error.
    ///
    /// The last error is returned unchanged once attempts are exhausted;
    /// non-transient errors propagate immediately.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        // Cap the exponent so the ceiling cannot overflow for absurd attempt
        // counts.
        let ceiling = self.base_delay.as_secs_f64() * 2f64.powi(attempt.min(32) as i32 - 1);
        if ceiling <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..=ceiling))
    }
}
