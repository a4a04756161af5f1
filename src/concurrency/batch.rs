//! Bounded-channel batch processor.
//!
//! A fixed pool of worker tasks drains a bounded channel of work items.
//! The bounded channel is the backpressure mechanism: when it is full,
//! submitters wait — there is no buffering escape and no drop policy.
//! A failing item is logged and surfaced through its reply slot without
//! disturbing the worker.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{Stream, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::concurrency::cancel::CancelSource;
use crate::core::errors::{Result, ScannerError};

/// Worker-pool sizing and channel capacity.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Number of worker tasks draining the channel.
    pub worker_count: usize,
    /// Bounded-channel capacity; full means submitters wait.
    pub channel_capacity: usize,
    /// Preferred chunk size for batch submission helpers.
    pub batch_size: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            worker_count: 4,
            channel_capacity: 64,
            batch_size: 16,
        }
    }
}

impl BatchOptions {
    /// Preset for CPU-bound processors: one worker per core, small channel.
    pub fn cpu_intensive() -> Self {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        Self {
            worker_count: cores,
            channel_capacity: cores * 2,
            batch_size: cores,
        }
    }

    /// Preset for IO-bound processors: oversubscribed workers, deep channel.
    pub fn io_intensive() -> Self {
        let cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        Self {
            worker_count: cores * 4,
            channel_capacity: cores * 16,
            batch_size: cores * 4,
        }
    }
}

/// Snapshot of aggregate processor statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatistics {
    /// Items completed (successfully or not).
    pub items_processed: u64,
    /// Items whose processor returned an error.
    pub failed_items: u64,
    /// Mean per-item processing time in milliseconds.
    pub average_ms: f64,
    /// Items per second since the processor was created.
    pub throughput_per_sec: f64,
}

#[derive(Debug, Default)]
struct StatCounters {
    items_processed: AtomicU64,
    failed_items: AtomicU64,
    total_nanos: AtomicU64,
}

struct WorkItem<T, U> {
    input: T,
    reply: oneshot::Sender<Result<U>>,
}

type Processor<T, U> =
    Arc<dyn Fn(T) -> Pin<Box<dyn Future<Output = Result<U>> + Send>> + Send + Sync>;

/// Bounded-channel worker-pool processor mapping inputs `T` to outputs `U`.
pub struct BatchProcessor<T, U> {
    tx: mpsc::Sender<WorkItem<T, U>>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<StatCounters>,
    started_at: Instant,
    cancel: CancelSource,
    disposed: Arc<AtomicBool>,
    options: BatchOptions,
}

impl<T, U> BatchProcessor<T, U>
where
    T: Send + 'static,
    U: Send + 'static,
{
    /// Spawn the worker pool around `processor`.
    pub fn new<F, Fut>(options: BatchOptions, processor: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U>> + Send + 'static,
    {
        let processor: Processor<T, U> = Arc::new(
            move |input| -> Pin<Box<dyn Future<Output = Result<U>> + Send>> {
                Box::pin(processor(input))
            },
        );
        let (tx, rx) = mpsc::channel::<WorkItem<T, U>>(options.channel_capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(StatCounters::default());
        let cancel = CancelSource::new();

        let mut workers = Vec::with_capacity(options.worker_count.max(1));
        for worker_id in 0..options.worker_count.max(1) {
            let rx = Arc::clone(&rx);
            let processor = Arc::clone(&processor);
            let stats = Arc::clone(&stats);
            let token = cancel.token();

            workers.push(tokio::spawn(async move {
                loop {
                    let item = tokio::select! {
                        item = async { rx.lock().await.recv().await } => item,
                        () = token.cancelled() => None,
                    };
                    let Some(WorkItem { input, reply }) = item else {
                        debug!(worker_id, "batch worker shutting down");
                        break;
                    };

                    let start = Instant::now();
                    let result = processor(input).await;
                    let elapsed = start.elapsed();

                    stats.items_processed.fetch_add(1, Ordering::Relaxed);
                    stats
                        .total_nanos
                        .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
                    if let Err(err) = &result {
                        stats.failed_items.fetch_add(1, Ordering::Relaxed);
                        warn!(worker_id, error = %err, "batch item failed");
                    }

                    // The submitter may have given up; a dead reply slot is
                    // not a worker error.
                    let _ = reply.send(result);
                }
            }));
        }

        Self {
            tx,
            workers,
            stats,
            started_at: Instant::now(),
            cancel,
            disposed: Arc::new(AtomicBool::new(false)),
            options,
        }
    }

    /// Options this processor was built with.
    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Submit one item and await its result. Waits while the channel is
    /// full; fails fast once the processor is disposed.
    pub async fn submit(&self, input: T) -> Result<U> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ScannerError::concurrency("batch processor is disposed"));
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkItem {
                input,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ScannerError::concurrency("batch processor is disposed"))?;
        reply_rx
            .await
            .map_err(|_| ScannerError::Cancelled)?
    }

    /// Enqueue a whole batch and await every outcome in input order. The
    /// bounded channel applies backpressure while enqueueing.
    pub async fn process_batch(&self, items: Vec<T>) -> Result<Vec<Result<U>>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(ScannerError::concurrency("batch processor is disposed"));
        }

        let mut replies = Vec::with_capacity(items.len());
        for input in items {
            let (reply_tx, reply_rx) = oneshot::channel();
            self.tx
                .send(WorkItem {
                    input,
                    reply: reply_tx,
                })
                .await
                .map_err(|_| ScannerError::concurrency("batch processor is disposed"))?;
            replies.push(reply_rx);
        }

        let mut outcomes = Vec::with_capacity(replies.len());
        for reply in replies {
            outcomes.push(reply.await.map_err(|_| ScannerError::Cancelled)?);
        }
        Ok(outcomes)
    }

    /// Stream items through the pool, producing outcomes on a bounded output
    /// channel in input order. The enqueue and drain halves run
    /// independently, so results flow while the input stream is still being
    /// consumed.
    pub fn process_stream<S>(&self, stream: S) -> mpsc::Receiver<Result<U>>
    where
        S: Stream<Item = T> + Send + 'static,
    {
        let capacity = self.options.channel_capacity.max(1);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let (reply_queue_tx, mut reply_queue_rx) =
            mpsc::channel::<oneshot::Receiver<Result<U>>>(capacity);
        let work_tx = self.tx.clone();
        let disposed = Arc::clone(&self.disposed);

        tokio::spawn(async move {
            futures::pin_mut!(stream);
            while let Some(input) = stream.next().await {
                if disposed.load(Ordering::Acquire) {
                    break;
                }
                let (reply_tx, reply_rx) = oneshot::channel();
                if work_tx
                    .send(WorkItem {
                        input,
                        reply: reply_tx,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
                if reply_queue_tx.send(reply_rx).await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(reply) = reply_queue_rx.recv().await {
                let outcome = match reply.await {
                    Ok(inner) => inner,
                    Err(_) => Err(ScannerError::Cancelled),
                };
                if out_tx.send(outcome).await.is_err() {
                    break;
                }
            }
        });

        out_rx
    }

    /// Aggregate statistics snapshot.
    pub fn statistics(&self) -> BatchStatistics {
        let items = self.stats.items_processed.load(Ordering::Relaxed);
        let failed = self.stats.failed_items.load(Ordering::Relaxed);
        let total_nanos = self.stats.total_nanos.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed();

        BatchStatistics {
            items_processed: items,
            failed_items: failed,
            average_ms: if items == 0 {
                0.0
            } else {
                (total_nanos as f64 / items as f64) / 1_000_000.0
            },
            throughput_per_sec: if elapsed.is_zero() {
                0.0
            } else {
                items as f64 / elapsed.as_secs_f64()
            },
        }
    }

    /// Dispose and wait for every worker to exit.
    pub async fn shutdown(mut self) {
        self.dispose();
        for worker in self.workers.drain(..) {
            let _ = worker.await;
        }
    }
}

impl<T, U> BatchProcessor<T, U> {
    /// Stop accepting work and cancel the workers. Idempotent; in-flight
    /// items may still complete their reply slots.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.cancel.cancel();
        }
    }
}

impl<T, U> Drop for BatchProcessor<T, U> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
