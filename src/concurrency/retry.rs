//! Retry with exponential backoff and jitter.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::concurrency::cancel::CancelToken;
use crate::core::errors::{Result, ScannerError};

/// Exponential-backoff retry policy.
///
/// An operation with `max_retries = N` is invoked at most `N + 1` times.
/// Delays grow by `multiplier` per attempt, are multiplied by a uniform
/// jitter in `[0.5, 1.5]`, and are capped at `max_delay`. Cancellation is
/// never retried and aborts the wait immediately.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Backoff multiplier per attempt; clamped to at least 1.0.
    pub multiplier: f64,
    /// Upper bound on any single computed delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// The `Default` preset: 3 retries starting at 1 second.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Preset for chatty transient failures: 5 retries starting at 100 ms.
    pub fn aggressive() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Preset for expensive operations: 2 retries starting at 5 seconds.
    pub fn conservative() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Backoff for the given zero-based attempt, before jitter.
    fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.multiplier.max(1.0);
        let scaled = self.initial_delay.as_secs_f64() * multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }

    /// Jittered delay for the given attempt: uniform in `[0.5, 1.5]` times
    /// the base backoff, still capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = rand::thread_rng().gen_range(0.5..=1.5);
        let jittered = Duration::from_secs_f64(base.as_secs_f64() * jitter);
        jittered.min(self.max_delay)
    }

    /// Run `op` under this policy, retrying on any transient error.
    pub async fn execute<F, Fut, T>(&self, op: F, cancel: &CancelToken) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.execute_if(op, |err| err.is_transient(), cancel).await
    }

    /// Run `op` under this policy, retrying only when `should_retry` holds.
    /// Cancellation errors bypass the predicate and abort immediately.
    pub async fn execute_if<F, Fut, T, P>(
        &self,
        mut op: F,
        should_retry: P,
        cancel: &CancelToken,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
        P: Fn(&ScannerError) -> bool,
    {
        let mut attempt: u32 = 0;
        loop {
            cancel.check()?;

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    if attempt >= self.max_retries || !should_retry(&err) {
                        if attempt > 0 {
                            warn!(attempts = attempt + 1, error = %err, "retries exhausted");
                        }
                        return Err(err);
                    }

                    let delay = self.delay_for_attempt(attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "operation failed, backing off"
                    );

                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = cancel.cancelled() => return Err(ScannerError::Cancelled),
                    }
                    attempt += 1;
                }
            }
        }
    }
}
