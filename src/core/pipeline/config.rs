//! Pipeline configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, ScannerError};
use crate::io::reports::ReportOptions;

/// How the analyze stage schedules analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionStrategy {
    /// One analyzer at a time, in priority order.
    Sequential,
    /// Every analyzer at once, priorities ignored.
    Parallel,
    /// Priority groups run sequentially; analyzers inside a group run in
    /// parallel.
    #[default]
    Prioritized,
    /// Like `Prioritized`, with requests grouped into batches so stages
    /// pipeline across groups.
    Batched,
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Analyzer scheduling strategy.
    pub strategy: ExecutionStrategy,
    /// Capacity of the inter-stage channels. Full channels block the
    /// producing stage.
    pub bounded_capacity: usize,
    /// Maximum analyzers running concurrently within one priority group.
    pub max_analysis_parallelism: usize,
    /// Per-analyzer timeout applied when the analyzer declares none.
    pub global_timeout: Duration,
    /// Keep a request going when one of its analyzers fails.
    pub continue_on_error: bool,
    /// Request batch size for [`ExecutionStrategy::Batched`].
    pub batch_size: usize,
    /// Report composition options.
    pub report: ReportOptions,
    /// Write a `<stem>-AUTOSCAN.md` beside each input `.log` file.
    pub write_report_file: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            strategy: ExecutionStrategy::Prioritized,
            bounded_capacity: 16,
            max_analysis_parallelism: 4,
            global_timeout: Duration::from_secs(60),
            continue_on_error: true,
            batch_size: 8,
            report: ReportOptions::default(),
            write_report_file: true,
        }
    }
}

impl PipelineOptions {
    /// Reject configurations that cannot schedule work.
    pub fn validate(&self) -> Result<()> {
        if self.bounded_capacity == 0 {
            return Err(ScannerError::config_field(
                "bounded_capacity must be at least 1",
                "bounded_capacity",
            ));
        }
        if self.max_analysis_parallelism == 0 {
            return Err(ScannerError::config_field(
                "max_analysis_parallelism must be at least 1",
                "max_analysis_parallelism",
            ));
        }
        if self.batch_size == 0 {
            return Err(ScannerError::config_field(
                "batch_size must be at least 1",
                "batch_size",
            ));
        }
        if self.global_timeout.is_zero() {
            return Err(ScannerError::config_field(
                "global_timeout must be non-zero",
                "global_timeout",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_validate() {
        PipelineOptions::default().validate().expect("default");
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let options = PipelineOptions {
            bounded_capacity: 0,
            ..PipelineOptions::default()
        };
        assert!(matches!(
            options.validate(),
            Err(ScannerError::Config { .. })
        ));
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let options = PipelineOptions {
            max_analysis_parallelism: 0,
            ..PipelineOptions::default()
        };
        assert!(options.validate().is_err());
    }
}
