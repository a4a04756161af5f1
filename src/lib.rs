//! # Scanner111: Bethesda-Game Diagnostics Engine
//!
//! A diagnostics library for Bethesda-game installations (primarily Fallout 4,
//! also Skyrim SE). Scanner111 reads crash logs produced by the game's
//! crash-generator plugin, inspects archived assets and configuration files,
//! and emits a structured, human-readable report of problems and recommended
//! actions. The library provides:
//!
//! - **Analysis Pipeline**: a staged, concurrent engine that loads crash logs,
//!   dispatches them through priority-grouped analyzers, and composes reports
//! - **Report Fragments**: an immutable tree of report content with markdown,
//!   HTML, JSON, and plain-text renderers
//! - **Archive Scanner**: BA2/BTDX container header parsing and discovery
//! - **Config Validators**: tolerant INI and TOML scanning with rule tables
//! - **Async Coordination**: batch processor, retry, rate limiters, circuit
//!   breaker, and lazy initialisers
//! - **Path Discovery**: multi-source game-installation lookup with TTL caches
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Analysis Pipeline                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Analyzers   │  Scanners     │  Concurrency  │  I/O         │
//! │              │               │               │              │
//! │ • CrashHdr   │ • BA2 archive │ • Batch       │ • Mmap pool  │
//! │ • Plugins    │ • INI rules   │ • Retry       │ • Path cache │
//! │ • Settings   │ • TOML rules  │ • RateLimit   │ • Discovery  │
//! │ • Memory     │               │ • Breaker     │ • Reports    │
//! │ • Fcx        │               │ • Lazy        │              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scanner111::core::pipeline::{AnalysisPipeline, PipelineOptions};
//! use scanner111::core::pipeline::AnalysisRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = AnalysisPipeline::builder()
//!         .with_default_analyzers()
//!         .options(PipelineOptions::default())
//!         .build();
//!
//!     let request = AnalysisRequest::new("crash-2024-05-14-12-00-00.log");
//!     let outcome = pipeline.run_one(request).await?;
//!     println!("{}", outcome.report);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::fn_params_excessive_bools)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod analyzers;
pub mod concurrency;
pub mod core;
pub mod integrity;
pub mod io;
pub mod scanners;

// Re-export primary types for convenience
pub use crate::core::analyzer::{AnalysisResult, Analyzer, Severity};
pub use crate::core::context::{AnalysisContext, SettingsProvider};
pub use crate::core::errors::{Result, ScannerError, ScannerResultExt};
pub use crate::core::fragment::{FragmentKind, FragmentVisibility, ReportFragment};
pub use crate::core::pipeline::{AnalysisPipeline, AnalysisRequest, PipelineOptions};
pub use crate::core::Game;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Install a `tracing` subscriber reading `RUST_LOG`, for hosts that do not
/// bring their own. Later calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}
