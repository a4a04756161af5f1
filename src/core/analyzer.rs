//! Analyzer protocol: the polymorphic unit of work in the pipeline.
//!
//! Every analyzer declares a name, a scheduling priority, and an optional
//! per-invocation timeout, and produces an [`AnalysisResult`] from a shared
//! [`AnalysisContext`]. Analyzers with a lower priority run in an earlier
//! group; analyzers sharing a priority run in parallel within one group.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::context::AnalysisContext;
use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;

/// Severity of an analyzer finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Severity {
    /// Informational finding.
    #[default]
    Info,
    /// The user should look at this.
    Warning,
    /// A problem that needs fixing.
    Error,
    /// The installation is broken or the crash cause is identified.
    Critical,
}

/// Immutable outcome of one analyzer invocation.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Name of the analyzer that produced this result.
    pub analyzer_name: String,
    /// False when the analyzer itself failed (threw, timed out, was
    /// cancelled) — not when it merely found problems.
    pub success: bool,
    /// Highest severity among the findings.
    pub severity: Severity,
    /// Report content, absent when the analyzer had nothing to say.
    pub fragment: Option<ReportFragment>,
    /// Analyzer-level error strings (timeouts, trapped panics, I/O).
    pub errors: Vec<String>,
    /// Wall-clock duration of the invocation.
    pub duration: Duration,
    /// When set, the orchestrator skips all later priority groups for this
    /// request.
    pub skip_further_processing: bool,
}

impl AnalysisResult {
    /// Successful result carrying a fragment.
    pub fn success(analyzer_name: impl Into<String>, fragment: ReportFragment) -> Self {
        Self {
            analyzer_name: analyzer_name.into(),
            success: true,
            severity: Severity::Info,
            fragment: Some(fragment),
            errors: Vec::new(),
            duration: Duration::ZERO,
            skip_further_processing: false,
        }
    }

    /// Successful result with nothing to report.
    pub fn quiet(analyzer_name: impl Into<String>) -> Self {
        Self {
            analyzer_name: analyzer_name.into(),
            success: true,
            severity: Severity::Info,
            fragment: None,
            errors: Vec::new(),
            duration: Duration::ZERO,
            skip_further_processing: false,
        }
    }

    /// Failed result with an error description.
    pub fn failure(analyzer_name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            analyzer_name: analyzer_name.into(),
            success: false,
            severity: Severity::Error,
            fragment: None,
            errors: vec![error.into()],
            duration: Duration::ZERO,
            skip_further_processing: false,
        }
    }

    /// Set the overall severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Record the invocation duration.
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Request that later priority groups be skipped.
    #[must_use]
    pub fn skip_remaining(mut self) -> Self {
        self.skip_further_processing = true;
        self
    }
}

/// A processor dispatched by the pipeline against one request.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable analyzer name, used for enable-sets, metrics, and reports.
    fn name(&self) -> &str;

    /// Scheduling priority: lower runs earlier. Analyzers sharing a priority
    /// form one group and run in parallel.
    fn priority(&self) -> i32 {
        100
    }

    /// Per-invocation timeout. `None` defers to the pipeline's global
    /// timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    /// Inspect the context and produce a result. Content-level problems
    /// belong in the result's fragment and severity; returning `Err` marks
    /// the analyzer itself as failed.
    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult>;
}
