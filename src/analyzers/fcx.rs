//! File-integrity (FCX-mode) validation.
//!
//! Enabled by the `fcx_mode` setting. Checks the installation itself:
//! script-extender loader presence, Address Library presence, and archive
//! invalidation in the custom ini.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::core::analyzer::{AnalysisResult, Analyzer, Severity};
use crate::core::context::AnalysisContext;
use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;
use crate::integrity;
use crate::io::paths::discovery::GamePathDiscovery;

/// Settings key that switches the integrity checks on.
pub const FCX_MODE_KEY: &str = "fcx_mode";

/// Settings key pointing at the custom ini (optional).
pub const CUSTOM_INI_KEY: &str = "game_custom_ini";

/// Runs file-integrity checks against the installed game.
#[derive(Debug, Default)]
pub struct FcxAnalyzer;

#[async_trait]
impl Analyzer for FcxAnalyzer {
    fn name(&self) -> &str {
        "fcx"
    }

    fn priority(&self) -> i32 {
        50
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let started = Instant::now();

        if ctx.settings().get_bool(FCX_MODE_KEY) != Some(true) {
            debug!("fcx mode disabled; integrity checks skipped");
            return Ok(AnalysisResult::quiet(self.name()).with_duration(started.elapsed()));
        }

        let game = ctx.game();
        let spec = game.spec();
        let Some(game_root) = ctx
            .settings()
            .get_path(&GamePathDiscovery::configured_path_key(game))
        else {
            return Ok(AnalysisResult::success(
                self.name(),
                ReportFragment::info(
                    "File Integrity",
                    "game path not configured; file checks skipped",
                )
                .with_order(230),
            )
            .with_duration(started.elapsed()));
        };

        let mut children = Vec::new();
        let mut severity = Severity::Info;

        if integrity::xse_installed(&game_root, spec) {
            children.push(ReportFragment::info(
                "Script Extender",
                format!("{} is installed", spec.xse_base),
            ));
        } else {
            severity = severity.max(Severity::Error);
            children.push(ReportFragment::error(
                "Script Extender",
                format!(
                    "{} not found ({} is missing from the game folder)",
                    spec.xse_base, spec.xse_loader
                ),
            ));
        }

        if integrity::address_library_present(&game_root, spec) {
            children.push(ReportFragment::info(
                "Address Library",
                "Address Library is installed",
            ));
        } else {
            severity = severity.max(Severity::Error);
            children.push(ReportFragment::error(
                "Address Library",
                "Address Library not found; script-extender plugins will fail to load",
            ));
        }

        if let Some(custom_ini) = ctx.settings().get_path(CUSTOM_INI_KEY) {
            match integrity::archive_invalidation_enabled(&custom_ini) {
                Ok(true) => children.push(ReportFragment::info(
                    "Archive Invalidation",
                    "archive invalidation is enabled",
                )),
                Ok(false) => {
                    severity = severity.max(Severity::Warning);
                    children.push(ReportFragment::warning(
                        "Archive Invalidation",
                        "bInvalidateOlderFiles=1 is missing from the custom ini; \
                         loose-file mods will not load",
                    ));
                }
                Err(err) => {
                    severity = severity.max(Severity::Warning);
                    children.push(ReportFragment::warning(
                        "Archive Invalidation",
                        format!("could not read the custom ini: {err}"),
                    ));
                }
            }
        }

        Ok(AnalysisResult::success(
            self.name(),
            ReportFragment::with_children("File Integrity", children, 80),
        )
        .with_severity(severity)
        .with_duration(started.elapsed()))
    }
}
