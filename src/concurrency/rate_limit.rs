//! Token-bucket and sliding-window rate limiters.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::concurrency::cancel::CancelToken;
use crate::core::errors::{Result, ScannerError};

/// Token-bucket limiter: a bucket of at most `max_tokens` refilled with
/// `refill_amount` tokens every `refill_interval`.
///
/// Refill is computed lazily from elapsed time on each acquire, so the
/// limiter needs no background task. [`TokenBucketRateLimiter::acquire`]
/// waits until enough tokens accumulate; `try_acquire` never waits.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    max_tokens: u64,
    refill_interval: Duration,
    refill_amount: u64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// Create a full bucket.
    pub fn new(max_tokens: u64, refill_interval: Duration, refill_amount: u64) -> Self {
        Self {
            max_tokens,
            refill_interval,
            refill_amount,
            state: Mutex::new(BucketState {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        if self.refill_interval.is_zero() {
            state.tokens = self.max_tokens;
            return;
        }
        let elapsed = now.duration_since(state.last_refill);
        let intervals = (elapsed.as_nanos() / self.refill_interval.as_nanos().max(1)) as u64;
        if intervals == 0 {
            return;
        }
        let added = intervals.saturating_mul(self.refill_amount);
        state.tokens = state.tokens.saturating_add(added).min(self.max_tokens);
        state.last_refill += self.refill_interval * intervals as u32;
    }

    /// Take `n` tokens without waiting. Returns false when the bucket cannot
    /// cover the request right now.
    pub async fn try_acquire(&self, n: u64) -> bool {
        let mut state = self.state.lock().await;
        self.refill(&mut state, Instant::now());
        if state.tokens >= n {
            state.tokens -= n;
            true
        } else {
            false
        }
    }

    /// Take `n` tokens, waiting for refills as needed. Fails fast when `n`
    /// exceeds the bucket capacity (it could never be satisfied) and on
    /// cancellation.
    pub async fn acquire(&self, n: u64, cancel: &CancelToken) -> Result<()> {
        if n > self.max_tokens {
            return Err(ScannerError::invalid_input(format!(
                "requested {n} tokens but bucket capacity is {}",
                self.max_tokens
            )));
        }

        loop {
            cancel.check()?;
            {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                self.refill(&mut state, now);
                if state.tokens >= n {
                    state.tokens -= n;
                    return Ok(());
                }
            }

            tokio::select! {
                () = tokio::time::sleep(self.refill_interval.max(Duration::from_millis(1))) => {}
                () = cancel.cancelled() => return Err(ScannerError::Cancelled),
            }
        }
    }

    /// Acquire a single token, run `op`, and return its output.
    pub async fn execute_with_rate_limit<F, Fut, T>(
        &self,
        op: F,
        cancel: &CancelToken,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.acquire(1, cancel).await?;
        op().await
    }
}

/// Sliding-window limiter: at most `max_requests` acquisitions within any
/// trailing `window`.
///
/// Timestamps of granted acquisitions are kept in a FIFO queue; acquire
/// prunes expired entries, admits while under the cap, and otherwise sleeps
/// until the oldest entry ages out (with a small floor to avoid busy-spin).
#[derive(Debug)]
pub struct SlidingWindowRateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowRateLimiter {
    /// Create an empty window.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit without waiting; false when the window is full.
    pub async fn try_acquire(&self) -> bool {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        self.prune(&mut timestamps, now);
        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Admit, waiting for the oldest request to age out of the window when
    /// full.
    pub async fn acquire(&self, cancel: &CancelToken) -> Result<()> {
        loop {
            cancel.check()?;
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                self.prune(&mut timestamps, now);
                if timestamps.len() < self.max_requests {
                    timestamps.push_back(now);
                    return Ok(());
                }
                match timestamps.front() {
                    Some(oldest) => self
                        .window
                        .saturating_sub(now.duration_since(*oldest))
                        .max(Duration::from_millis(1)),
                    None => Duration::from_millis(1),
                }
            };

            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                () = cancel.cancelled() => return Err(ScannerError::Cancelled),
            }
        }
    }

    /// Acquire a slot, run `op`, and return its output.
    pub async fn execute_with_rate_limit<F, Fut, T>(
        &self,
        op: F,
        cancel: &CancelToken,
    ) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.acquire(cancel).await?;
        op().await
    }
}
