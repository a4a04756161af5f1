//! Bounded-concurrency combinators.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::core::errors::{Result, ScannerError};

/// Run `body` over every item with at most `max_dop` in flight. The first
/// error aborts the remaining work and is returned.
pub async fn parallel_for_each<T, F, Fut>(
    items: impl IntoIterator<Item = T>,
    max_dop: usize,
    body: F,
) -> Result<()>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut stream = futures::stream::iter(items.into_iter().map(|item| body(item)))
        .buffer_unordered(max_dop.max(1));
    while let Some(outcome) = stream.next().await {
        outcome?;
    }
    Ok(())
}

/// Drive a set of futures with at most `max_dop` in flight, collecting each
/// outcome. Individual failures do not abort the rest; results arrive in
/// completion order.
pub async fn execute_with_concurrency<Fut, T>(
    futures: impl IntoIterator<Item = Fut>,
    max_dop: usize,
) -> Vec<Result<T>>
where
    Fut: Future<Output = Result<T>>,
{
    futures::stream::iter(futures)
        .buffer_unordered(max_dop.max(1))
        .collect()
        .await
}

/// Process items in batches of `batch_size`, at most `max_dop` batches in
/// flight, preserving batch order in the flattened output.
pub async fn batch_process<T, U, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    max_dop: usize,
    body: F,
) -> Result<Vec<U>>
where
    F: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = Result<Vec<U>>>,
{
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        batches.push(items.by_ref().take(batch_size).collect::<Vec<_>>());
    }

    let mut stream =
        futures::stream::iter(batches.into_iter().map(|batch| body(batch))).buffered(max_dop.max(1));

    let mut output = Vec::new();
    while let Some(batch_result) = stream.next().await {
        output.extend(batch_result?);
    }
    Ok(output)
}

/// Race a set of factories and return the first successful outcome, dropping
/// (and thereby cancelling) the rest. When every factory fails, the last
/// error is returned.
pub async fn first_successful<T, F, Fut>(factories: impl IntoIterator<Item = F>) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut in_flight: FuturesUnordered<Fut> =
        factories.into_iter().map(|factory| factory()).collect();

    if in_flight.is_empty() {
        return Err(ScannerError::invalid_input(
            "first_successful requires at least one factory",
        ));
    }

    let mut last_error = None;
    while let Some(outcome) = in_flight.next().await {
        match outcome {
            Ok(value) => return Ok(value),
            Err(err) => last_error = Some(err),
        }
    }
    Err(last_error.unwrap_or_else(|| ScannerError::internal("race produced no outcome")))
}

/// Trailing-edge debouncer: each call schedules `op` after `delay` and
/// aborts any previously pending call still inside its window.
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet window.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Schedule `op`, cancelling any pending one.
    pub fn call<Fut>(&self, op: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            op.await;
        });

        let mut pending = self.pending.lock();
        if let Some(previous) = pending.replace(handle) {
            previous.abort();
        }
    }

    /// Abort any pending call without scheduling a new one.
    pub fn cancel_pending(&self) {
        if let Some(previous) = self.pending.lock().take() {
            previous.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
