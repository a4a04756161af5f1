//! Memory-management conflict validation.
//!
//! Consumes the crash-generator scan published by the settings analyzer
//! (an earlier priority group) and reports the memory-specific conflicts:
//! X-Cell versus the crash generator's own memory patches, and the
//! redundant Baka ScrapHeap combination.

use std::time::Instant;

use async_trait::async_trait;

use crate::core::analyzer::{AnalysisResult, Analyzer, Severity};
use crate::core::context::{keys, AnalysisContext};
use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;
use crate::scanners::toml_cfg::TomlScanResult;

use super::settings::MEMORY_SETTING_KEYS;

/// Reports memory-manager conflicts from the published settings scan.
#[derive(Debug, Default)]
pub struct MemoryConflictAnalyzer;

#[async_trait]
impl Analyzer for MemoryConflictAnalyzer {
    fn name(&self) -> &str {
        "memory-conflicts"
    }

    fn priority(&self) -> i32 {
        40
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let started = Instant::now();
        let Some(scan) = ctx.get::<TomlScanResult>(keys::CRASH_GEN_SETTINGS) else {
            // Settings analyzer did not run or found nothing to scan.
            return Ok(AnalysisResult::quiet(self.name()).with_duration(started.elapsed()));
        };

        let mut children = Vec::new();
        let mut severity = Severity::Info;

        for issue in scan.issues.iter().filter(|issue| {
            MEMORY_SETTING_KEYS.contains(&issue.key.as_str())
                || issue.file_name == "bakascrapheap.dll"
        }) {
            severity = severity.max(issue.severity);
            let title = if issue.key.is_empty() {
                issue.file_name.clone()
            } else {
                format!("[{}] {}", issue.section, issue.key)
            };
            let fragment = match issue.severity {
                Severity::Error | Severity::Critical => ReportFragment::error(
                    title,
                    format!(
                        "{} (currently {}, should be {})",
                        issue.description,
                        issue.current_value,
                        issue.recommended_value.as_deref().unwrap_or("changed")
                    ),
                ),
                _ => ReportFragment::warning(
                    title,
                    format!(
                        "{} (currently {}, should be {})",
                        issue.description,
                        issue.current_value,
                        issue.recommended_value.as_deref().unwrap_or("changed")
                    ),
                ),
            };
            children.push(fragment);
        }

        if children.is_empty() {
            return Ok(AnalysisResult::quiet(self.name()).with_duration(started.elapsed()));
        }

        Ok(AnalysisResult::success(
            self.name(),
            ReportFragment::with_children("Memory Management", children, 30),
        )
        .with_severity(severity)
        .with_duration(started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::InMemorySettings;
    use crate::core::Game;
    use crate::scanners::ConfigIssue;
    use std::path::PathBuf;
    use std::sync::Arc;

    fn context_with_scan(scan: TomlScanResult) -> AnalysisContext {
        let ctx = AnalysisContext::new(
            "crash.log",
            Some(Game::Fallout4),
            Arc::new(InMemorySettings::new()),
        );
        ctx.set(keys::CRASH_GEN_SETTINGS, scan);
        ctx
    }

    fn memory_issue(key: &str, severity: Severity) -> ConfigIssue {
        ConfigIssue {
            file_path: PathBuf::from("config.toml"),
            file_name: "config.toml".to_string(),
            section: "Patches".to_string(),
            key: key.to_string(),
            current_value: "True".to_string(),
            recommended_value: Some("False".to_string()),
            description: "conflicts with X-Cell".to_string(),
            severity,
        }
    }

    #[tokio::test]
    async fn reports_memory_conflicts_from_shared_data() {
        let scan = TomlScanResult {
            config_file_found: true,
            issues: vec![
                memory_issue("MemoryManager", Severity::Warning),
                memory_issue("Achievements", Severity::Warning),
            ],
            ..TomlScanResult::default()
        };
        let ctx = context_with_scan(scan);

        let result = MemoryConflictAnalyzer.analyze(&ctx).await.expect("runs");
        assert!(result.success);
        let markdown = result.fragment.expect("fragment").to_markdown();
        assert!(markdown.contains("MemoryManager"));
        assert!(
            !markdown.contains("Achievements"),
            "non-memory issues belong to the settings analyzer"
        );
    }

    #[tokio::test]
    async fn baka_redundancy_escalates_severity() {
        let mut issue = memory_issue("", Severity::Error);
        issue.file_name = "bakascrapheap.dll".to_string();
        let scan = TomlScanResult {
            config_file_found: true,
            issues: vec![issue],
            ..TomlScanResult::default()
        };
        let ctx = context_with_scan(scan);

        let result = MemoryConflictAnalyzer.analyze(&ctx).await.expect("runs");
        assert_eq!(result.severity, Severity::Error);
    }

    #[tokio::test]
    async fn absent_shared_data_is_quiet() {
        let ctx = AnalysisContext::new(
            "crash.log",
            Some(Game::Fallout4),
            Arc::new(InMemorySettings::new()),
        );
        let result = MemoryConflictAnalyzer.analyze(&ctx).await.expect("runs");
        assert!(result.success);
        assert!(result.fragment.is_none());
    }
}
