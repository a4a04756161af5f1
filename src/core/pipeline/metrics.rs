//! Pipeline metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Counters for one pipeline stage.
#[derive(Debug, Default)]
pub struct StageMetrics {
    items: AtomicU64,
    total_nanos: AtomicU64,
}

impl StageMetrics {
    /// Record one processed item and the time it took.
    pub fn record(&self, elapsed: Duration) {
        self.items.fetch_add(1, Ordering::Relaxed);
        self.total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StageSnapshot {
        let items = self.items.load(Ordering::Relaxed);
        let total = Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed));
        StageSnapshot {
            items_processed: items,
            total_elapsed_ms: total.as_secs_f64() * 1000.0,
            throughput_per_sec: if total.is_zero() {
                0.0
            } else {
                items as f64 / total.as_secs_f64()
            },
        }
    }
}

#[derive(Debug, Default)]
struct AnalyzerCounters {
    runs: AtomicU64,
    failures: AtomicU64,
    total_nanos: AtomicU64,
}

/// Live metrics shared by the pipeline stages.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Load-stage counters.
    pub load: StageMetrics,
    /// Analyze-stage counters (per request).
    pub analyze: StageMetrics,
    /// Compose-stage counters.
    pub compose: StageMetrics,
    analyzers: DashMap<String, AnalyzerCounters>,
}

impl PipelineMetrics {
    /// Record one analyzer invocation.
    pub fn record_analyzer(&self, name: &str, elapsed: Duration, failed: bool) {
        let entry = self.analyzers.entry(name.to_string()).or_default();
        entry.runs.fetch_add(1, Ordering::Relaxed);
        entry
            .total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        if failed {
            entry.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Freeze the counters into a serialisable snapshot.
    pub fn snapshot(&self, wall_clock: Duration) -> MetricsSnapshot {
        let mut analyzers: Vec<AnalyzerSnapshot> = self
            .analyzers
            .iter()
            .map(|entry| {
                let runs = entry.runs.load(Ordering::Relaxed);
                let total = Duration::from_nanos(entry.total_nanos.load(Ordering::Relaxed));
                AnalyzerSnapshot {
                    name: entry.key().clone(),
                    runs,
                    failures: entry.failures.load(Ordering::Relaxed),
                    average_ms: if runs == 0 {
                        0.0
                    } else {
                        total.as_secs_f64() * 1000.0 / runs as f64
                    },
                }
            })
            .collect();
        analyzers.sort_by(|a, b| a.name.cmp(&b.name));

        MetricsSnapshot {
            wall_clock_ms: wall_clock.as_secs_f64() * 1000.0,
            load: self.load.snapshot(),
            analyze: self.analyze.snapshot(),
            compose: self.compose.snapshot(),
            analyzers,
        }
    }
}

/// Frozen stage counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSnapshot {
    /// Items the stage processed.
    pub items_processed: u64,
    /// Summed per-item processing time.
    pub total_elapsed_ms: f64,
    /// Items per second of stage time.
    pub throughput_per_sec: f64,
}

/// Frozen per-analyzer counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzerSnapshot {
    /// Analyzer name.
    pub name: String,
    /// Invocations.
    pub runs: u64,
    /// Failed invocations.
    pub failures: u64,
    /// Mean invocation time.
    pub average_ms: f64,
}

/// Frozen pipeline metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Run wall-clock time.
    pub wall_clock_ms: f64,
    /// Load-stage counters.
    pub load: StageSnapshot,
    /// Analyze-stage counters.
    pub analyze: StageSnapshot,
    /// Compose-stage counters.
    pub compose: StageSnapshot,
    /// Per-analyzer counters, sorted by name.
    pub analyzers: Vec<AnalyzerSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = PipelineMetrics::default();
        metrics.load.record(Duration::from_millis(10));
        metrics.load.record(Duration::from_millis(30));
        metrics.record_analyzer("plugins", Duration::from_millis(5), false);
        metrics.record_analyzer("plugins", Duration::from_millis(15), true);

        let snapshot = metrics.snapshot(Duration::from_millis(100));
        assert_eq!(snapshot.load.items_processed, 2);
        assert!(snapshot.load.total_elapsed_ms >= 40.0);
        assert!(snapshot.load.throughput_per_sec > 0.0);

        assert_eq!(snapshot.analyzers.len(), 1);
        let plugins = &snapshot.analyzers[0];
        assert_eq!(plugins.runs, 2);
        assert_eq!(plugins.failures, 1);
        assert!(plugins.average_ms >= 9.0);
    }
}
