//! Crash-generator settings validation.
//!
//! Runs the TOML scanner over the script-extender plugins directory and
//! reports configuration problems other than memory management (those
//! belong to the memory-conflict analyzer running in the next group). The
//! full scan result is published to shared data for downstream analyzers.

use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::concurrency::cancel::CancelToken;
use crate::core::analyzer::{AnalysisResult, Analyzer, Severity};
use crate::core::context::{keys, AnalysisContext};
use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;
use crate::io::paths::discovery::GamePathDiscovery;
use crate::scanners::toml_cfg::{TomlScanResult, TomlScanner};

/// Settings key for an explicit script-extender plugins directory.
pub const PLUGINS_DIR_KEY: &str = "xse_plugins_dir";

/// Crash-generator setting keys owned by the memory-conflict analyzer.
pub const MEMORY_SETTING_KEYS: &[&str] = &[
    "MemoryManager",
    "HavokMemorySystem",
    "BSTextureStreamerLocalHeap",
];

fn is_memory_issue(key: &str, file_name: &str) -> bool {
    MEMORY_SETTING_KEYS.contains(&key) || file_name == "bakascrapheap.dll"
}

/// Validates the crash generator's TOML configuration.
#[derive(Debug, Default)]
pub struct CrashGenSettingsAnalyzer {
    scanner: TomlScanner,
}

impl CrashGenSettingsAnalyzer {
    fn plugins_dir(&self, ctx: &AnalysisContext) -> Option<PathBuf> {
        if let Some(dir) = ctx.settings().get_path(PLUGINS_DIR_KEY) {
            return Some(dir);
        }
        let game = ctx.game();
        let root = ctx
            .settings()
            .get_path(&GamePathDiscovery::configured_path_key(game))?;
        Some(root.join("Data").join(game.spec().xse_base).join("Plugins"))
    }
}

#[async_trait]
impl Analyzer for CrashGenSettingsAnalyzer {
    fn name(&self) -> &str {
        "crashgen-settings"
    }

    fn priority(&self) -> i32 {
        30
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let started = Instant::now();
        let game = ctx.game();

        let Some(plugins_dir) = self.plugins_dir(ctx) else {
            debug!("no plugins directory configured; settings scan skipped");
            return Ok(AnalysisResult::quiet(self.name()).with_duration(started.elapsed()));
        };

        let scan = self
            .scanner
            .scan(&plugins_dir, game, &CancelToken::never(), None)
            .await?;
        ctx.set(keys::CRASH_GEN_SETTINGS, scan.clone());

        Ok(build_result(self.name(), &scan).with_duration(started.elapsed()))
    }
}

fn build_result(name: &str, scan: &TomlScanResult) -> AnalysisResult {
    let mut children = Vec::new();
    let mut severity = Severity::Info;

    if !scan.config_file_found {
        return AnalysisResult::success(
            name,
            ReportFragment::info(
                "Crash Generator Settings",
                "no crash-generator configuration found",
            )
            .with_order(220),
        );
    }

    if scan.has_duplicate_configs {
        severity = severity.max(Severity::Warning);
        let listing = scan
            .config_paths
            .iter()
            .map(|p| format!("- {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n");
        children.push(ReportFragment::warning(
            "Duplicate Configuration",
            format!(
                "two crash-generator config files exist; the game reads only \
                 one of them:\n{listing}"
            ),
        ));
    }

    for failure in &scan.parse_failures {
        severity = severity.max(Severity::Warning);
        children.push(ReportFragment::warning(
            "Malformed Configuration",
            format!("{}: {}", failure.file_path.display(), failure.message),
        ));
    }

    for issue in scan
        .issues
        .iter()
        .filter(|issue| !is_memory_issue(&issue.key, &issue.file_name))
    {
        severity = severity.max(issue.severity);
        children.push(ReportFragment::warning(
            format!("[{}] {}", issue.section, issue.key),
            format!(
                "{} (currently {}, should be {})",
                issue.description,
                issue.current_value,
                issue.recommended_value.as_deref().unwrap_or("changed")
            ),
        ));
    }

    if children.is_empty() {
        return AnalysisResult::quiet(name);
    }

    AnalysisResult::success(
        name,
        ReportFragment::with_children("Crash Generator Settings", children, 40),
    )
    .with_severity(severity)
}
