//! Lazy async initialisers.
//!
//! Four variants over one idea — run an async factory at most once and share
//! the value:
//!
//! - [`AsyncLazy`]: at-most-once; a fault is cached and re-surfaced
//! - [`ResettableLazy`]: a fault or cancellation re-runs the factory on the
//!   next access; [`ResettableLazy::reset`] clears an initialised value
//! - [`TimeoutLazy`]: bounds the factory with a deadline, distinguishing the
//!   deadline from caller cancellation
//! - [`CachedLazy`]: time-to-live expiry with forced [`CachedLazy::refresh`]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;

use crate::concurrency::cancel::CancelToken;
use crate::core::errors::{Result, ScannerError};

type Factory<T> =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<T>> + Send>> + Send + Sync>;

fn boxed_factory<T, F, Fut>(factory: F) -> Factory<T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    Arc::new(
        move || -> Pin<Box<dyn Future<Output = Result<T>> + Send>> { Box::pin(factory()) },
    )
}

/// At-most-once async initialiser. The factory runs exactly once, even under
/// concurrent first access; a factory fault is cached and replayed to all
/// later callers.
pub struct AsyncLazy<T> {
    factory: Factory<T>,
    cell: OnceCell<std::result::Result<T, String>>,
}

impl<T: Clone + Send + Sync + 'static> AsyncLazy<T> {
    /// Wrap a factory.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            factory: boxed_factory(factory),
            cell: OnceCell::new(),
        }
    }

    /// Get the value, running the factory on first access.
    pub async fn get(&self) -> Result<T> {
        let factory = Arc::clone(&self.factory);
        let stored = self
            .cell
            .get_or_init(|| async move { factory().await.map_err(|e| e.to_string()) })
            .await;
        match stored {
            Ok(value) => Ok(value.clone()),
            Err(message) => Err(ScannerError::concurrency(format!(
                "lazy initialisation previously failed: {message}"
            ))),
        }
    }

    /// True once the factory has completed (successfully or not).
    pub fn is_initialised(&self) -> bool {
        self.cell.initialized()
    }
}

/// Lazy initialiser that retries after faults. Access is serialised by a
/// guard so the factory never runs twice concurrently; a fault (or a
/// cancelled factory) leaves the slot empty, and the next access runs the
/// factory again.
pub struct ResettableLazy<T> {
    factory: Factory<T>,
    slot: Mutex<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> ResettableLazy<T> {
    /// Wrap a factory.
    pub fn new<F, Fut>(factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            factory: boxed_factory(factory),
            slot: Mutex::new(None),
        }
    }

    /// Get the value, running the factory when the slot is empty.
    pub async fn get(&self) -> Result<T> {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = (self.factory)().await?;
        *slot = Some(value.clone());
        Ok(value)
    }

    /// Clear the slot; the next access re-runs the factory.
    pub async fn reset(&self) {
        *self.slot.lock().await = None;
    }
}

/// Lazy initialiser whose factory runs under a deadline. A deadline expiry
/// surfaces as [`ScannerError::Timeout`]; caller cancellation surfaces as
/// [`ScannerError::Cancelled`]. Either outcome leaves the slot empty for the
/// next access.
pub struct TimeoutLazy<T> {
    factory: Factory<T>,
    timeout: Duration,
    slot: Mutex<Option<T>>,
}

impl<T: Clone + Send + Sync + 'static> TimeoutLazy<T> {
    /// Wrap a factory with a deadline.
    pub fn new<F, Fut>(factory: F, timeout: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            factory: boxed_factory(factory),
            timeout,
            slot: Mutex::new(None),
        }
    }

    /// Get the value, bounding the factory by the deadline.
    pub async fn get(&self, cancel: &CancelToken) -> Result<T> {
        let mut slot = self.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }

        let value = tokio::select! {
            outcome = tokio::time::timeout(self.timeout, (self.factory)()) => match outcome {
                Ok(result) => result?,
                Err(_) => return Err(ScannerError::timeout(self.timeout)),
            },
            () = cancel.cancelled() => return Err(ScannerError::Cancelled),
        };

        *slot = Some(value.clone());
        Ok(value)
    }
}

/// Lazy initialiser with time-to-live expiry. A fresh value is served from
/// the slot; an expired or faulted slot re-runs the factory.
pub struct CachedLazy<T> {
    factory: Factory<T>,
    ttl: Duration,
    slot: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone + Send + Sync + 'static> CachedLazy<T> {
    /// Wrap a factory with a time-to-live.
    pub fn new<F, Fut>(factory: F, ttl: Duration) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            factory: boxed_factory(factory),
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// Get the value, refreshing when the slot is empty or expired.
    pub async fn get(&self) -> Result<T> {
        let mut slot = self.slot.lock().await;
        if let Some((value, refreshed_at)) = slot.as_ref() {
            if refreshed_at.elapsed() < self.ttl {
                return Ok(value.clone());
            }
        }
        let value = (self.factory)().await?;
        *slot = Some((value.clone(), Instant::now()));
        Ok(value)
    }

    /// Discard the slot and recompute immediately.
    pub async fn refresh(&self) -> Result<T> {
        let mut slot = self.slot.lock().await;
        let value = (self.factory)().await?;
        *slot = Some((value.clone(), Instant::now()));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting_factory(
        calls: Arc<AtomicU32>,
        fail_first: u32,
    ) -> impl Fn() -> Pin<Box<dyn Future<Output = Result<u32>> + Send>> + Send + Sync + 'static
    {
        move || {
            let calls = Arc::clone(&calls);
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < fail_first {
                    Err(ScannerError::internal("factory fault"))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test]
    async fn async_lazy_runs_factory_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let lazy = Arc::new(AsyncLazy::new(counting_factory(Arc::clone(&calls), 0)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let lazy = Arc::clone(&lazy);
            handles.push(tokio::spawn(async move { lazy.get().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("join").expect("value"), 0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_lazy_caches_fault() {
        let calls = Arc::new(AtomicU32::new(0));
        let lazy = AsyncLazy::new(counting_factory(Arc::clone(&calls), 10));

        assert!(lazy.get().await.is_err());
        assert!(lazy.get().await.is_err(), "fault is replayed, not re-run");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resettable_refactories_after_fault() {
        let calls = Arc::new(AtomicU32::new(0));
        let lazy = ResettableLazy::new(counting_factory(Arc::clone(&calls), 1));

        assert!(lazy.get().await.is_err());
        assert_eq!(lazy.get().await.expect("second run succeeds"), 1);
        assert_eq!(lazy.get().await.expect("cached"), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn resettable_reset_clears_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let lazy = ResettableLazy::new(counting_factory(Arc::clone(&calls), 0));

        assert_eq!(lazy.get().await.expect("first"), 0);
        lazy.reset().await;
        assert_eq!(lazy.get().await.expect("recomputed"), 1);
    }

    #[tokio::test]
    async fn timeout_lazy_distinguishes_timeout_from_cancel() {
        let slow = TimeoutLazy::new(
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1_u32)
            },
            Duration::from_millis(20),
        );
        let err = slow.get(&CancelToken::never()).await.expect_err("expires");
        assert!(matches!(err, ScannerError::Timeout { .. }));

        let source = crate::concurrency::cancel::CancelSource::new();
        let token = source.token();
        let slow = TimeoutLazy::new(
            || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1_u32)
            },
            Duration::from_secs(60),
        );
        source.cancel();
        let err = slow.get(&token).await.expect_err("cancelled");
        assert!(matches!(err, ScannerError::Cancelled));
    }

    #[tokio::test]
    async fn cached_lazy_expires_and_refreshes() {
        tokio::time::pause();
        let calls = Arc::new(AtomicU32::new(0));
        let lazy = CachedLazy::new(counting_factory(Arc::clone(&calls), 0), Duration::from_secs(5));

        assert_eq!(lazy.get().await.expect("first"), 0);
        assert_eq!(lazy.get().await.expect("fresh"), 0);

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(lazy.get().await.expect("expired, recomputed"), 1);

        assert_eq!(lazy.refresh().await.expect("forced"), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
