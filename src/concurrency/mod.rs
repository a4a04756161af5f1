//! Async coordination toolkit.
//!
//! Shared primitives for bounded concurrent work: a worker-pool batch
//! processor with backpressure, retry with exponential backoff and jitter,
//! token-bucket and sliding-window rate limiters, a circuit breaker, and a
//! family of lazy async initialisers. Every waiting operation here is
//! cancellation-aware; nothing blocks a worker indefinitely.

pub mod batch;
pub mod breaker;
pub mod cancel;
pub mod lazy;
pub mod parallel;
pub mod rate_limit;
pub mod retry;

pub use batch::{BatchOptions, BatchProcessor, BatchStatistics};
pub use breaker::{BreakerState, CircuitBreaker};
pub use cancel::{CancelSource, CancelToken};
pub use lazy::{AsyncLazy, CachedLazy, ResettableLazy, TimeoutLazy};
pub use rate_limit::{SlidingWindowRateLimiter, TokenBucketRateLimiter};
pub use retry::RetryPolicy;
