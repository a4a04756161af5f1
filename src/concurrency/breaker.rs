//! Circuit breaker for repeatedly failing operations.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::errors::{Result, ScannerError};

/// Breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow; consecutive failures are counted.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// One trial call is admitted; its outcome decides the next state.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Counts consecutive failures while closed; opens at `failure_threshold`;
/// rejects while open until `reset_timeout` elapses; then admits a single
/// half-open trial whose success closes the breaker and whose failure
/// re-opens it.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            name: name.into(),
            failure_threshold: failure_threshold.max(1),
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state, with the open → half-open transition applied lazily.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Consecutive failures observed while closed.
    pub fn failure_count(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Force the breaker closed and clear the failure count.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
        debug!(breaker = %self.name, "breaker manually reset");
    }

    fn refresh(&self, inner: &mut BreakerInner) {
        if inner.state == BreakerState::Open {
            let expired = inner
                .opened_at
                .map_or(true, |at| at.elapsed() >= self.reset_timeout);
            if expired {
                inner.state = BreakerState::HalfOpen;
                inner.trial_in_flight = false;
                debug!(breaker = %self.name, "breaker half-open, admitting trial");
            }
        }
    }

    /// Try to admit a call. Returns `Err(CircuitOpen)` without invoking
    /// anything when the breaker rejects.
    fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        self.refresh(&mut inner);
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::HalfOpen if !inner.trial_in_flight => {
                inner.trial_in_flight = true;
                Ok(())
            }
            _ => Err(ScannerError::CircuitOpen {
                name: self.name.clone(),
            }),
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BreakerState::HalfOpen {
            debug!(breaker = %self.name, "trial succeeded, closing breaker");
        }
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
                warn!(breaker = %self.name, "trial failed, re-opening breaker");
            }
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        breaker = %self.name,
                        failures = inner.consecutive_failures,
                        "failure threshold reached, opening breaker"
                    );
                }
            }
            BreakerState::Open => {}
        }
    }

    /// Run `op` under the breaker. Rejected calls return `CircuitOpen`
    /// without invoking `op`; cancellation passes through without counting
    /// as a breaker failure.
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.admit()?;
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) if err.is_cancelled() => {
                // A cancelled trial neither closes nor re-opens; release the
                // half-open slot so the next caller can retry.
                let mut inner = self.inner.lock();
                inner.trial_in_flight = false;
                drop(inner);
                Err(err)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }
}
