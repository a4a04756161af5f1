//! Staged analysis pipeline.
//!
//! Three bounded stages connected by typed channels:
//!
//! ```text
//! requests ──▶ Load ──▶ Analyze ──▶ Compose ──▶ outcomes
//!              mmap     priority     fragments
//!              decode   groups       + render
//! ```
//!
//! The bounded channels between stages are the only backpressure
//! mechanism: a full channel blocks the producer, nothing is dropped.

pub mod config;
pub mod executor;
pub mod metrics;

pub use config::{ExecutionStrategy, PipelineOptions};
pub use executor::{
    AnalysisOutcome, AnalysisPipeline, AnalysisPipelineBuilder, AnalysisRequest, PipelineRun,
    RequestState,
};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
