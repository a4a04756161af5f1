//! Crash-log header extraction.
//!
//! A Buffout 4 crash log opens with the game version, the crash generator's
//! own version line, and the unhandled-exception line:
//!
//! ```text
//! Fallout 4 v1.10.163
//! Buffout 4 v1.26.2
//!
//! Unhandled exception "EXCEPTION_ACCESS_VIOLATION" at 0x7FF6D4F5F2C7
//! ```
//!
//! The analyzer extracts these into shared data for the later groups and
//! reports them as the first section of the report.

use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::core::analyzer::{AnalysisResult, Analyzer, Severity};
use crate::core::context::{keys, AnalysisContext};
use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;
use crate::core::Game;

static GAME_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(Fallout 4(?: VR)?|Skyrim(?: Special Edition| SE| VR)?)\s+v?([0-9][0-9.]*)")
        .expect("static regex")
});

static CRASH_GEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(Buffout 4|Crash Logger(?: SSE)?)\s+v?([0-9][0-9.]*)").expect("static regex")
});

static MAIN_ERROR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Unhandled exception.*$").expect("static regex"));

/// Facts extracted from the top of a crash log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashHeader {
    /// Game identity, when the first line was recognised.
    pub game: Option<Game>,
    /// Game version text.
    pub game_version: Option<String>,
    /// Crash-generator plugin name.
    pub crash_gen_name: Option<String>,
    /// Crash-generator version text.
    pub crash_gen_version: Option<String>,
    /// The unhandled-exception line, verbatim.
    pub main_error: Option<String>,
}

impl CrashHeader {
    /// Parse the header facts out of full log text.
    pub fn parse(content: &str) -> Self {
        let (game, game_version) = GAME_VERSION_RE
            .captures(content)
            .map(|c| {
                let name = &c[1];
                let game = if name.starts_with("Fallout 4 VR") {
                    Game::Fallout4Vr
                } else if name.starts_with("Fallout 4") {
                    Game::Fallout4
                } else if name.contains("VR") {
                    Game::SkyrimVr
                } else {
                    Game::SkyrimSe
                };
                (Some(game), Some(c[2].to_string()))
            })
            .unwrap_or((None, None));

        let (crash_gen_name, crash_gen_version) = CRASH_GEN_RE
            .captures(content)
            .map(|c| (Some(c[1].to_string()), Some(c[2].to_string())))
            .unwrap_or((None, None));

        let main_error = MAIN_ERROR_RE
            .find(content)
            .map(|m| m.as_str().trim().to_string());

        Self {
            game,
            game_version,
            crash_gen_name,
            crash_gen_version,
            main_error,
        }
    }

    /// True when the log carried the pieces a crash report needs.
    pub fn is_complete(&self) -> bool {
        self.game_version.is_some() && self.main_error.is_some()
    }
}

/// Extracts the crash header and publishes it to shared data.
#[derive(Debug, Default)]
pub struct CrashHeaderAnalyzer;

#[async_trait]
impl Analyzer for CrashHeaderAnalyzer {
    fn name(&self) -> &str {
        "crash-header"
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let started = Instant::now();
        let Some(content) = ctx.get::<String>(keys::LOG_CONTENT) else {
            return Ok(
                AnalysisResult::failure(self.name(), "crash log content was not loaded")
                    .with_duration(started.elapsed()),
            );
        };

        let header = CrashHeader::parse(&content);
        debug!(?header.game, complete = header.is_complete(), "crash header parsed");

        if let Some(game) = header.game {
            ctx.set(keys::DETECTED_GAME, game);
        }

        let mut lines = Vec::new();
        if let (Some(game), Some(version)) = (header.game, header.game_version.as_ref()) {
            lines.push(format!("Game: {game} v{version}"));
        }
        if let (Some(name), Some(version)) =
            (header.crash_gen_name.as_ref(), header.crash_gen_version.as_ref())
        {
            lines.push(format!("Crash generator: {name} v{version}"));
        }
        if let Some(error) = header.main_error.as_ref() {
            lines.push(format!("Main error: {error}"));
        }

        let complete = header.is_complete();
        ctx.set(keys::CRASH_HEADER, header);

        let result = if complete {
            AnalysisResult::success(
                self.name(),
                ReportFragment::section("Crash Header", lines.join("\n")).with_order(20),
            )
        } else {
            AnalysisResult::success(
                self.name(),
                ReportFragment::warning(
                    "Crash Header",
                    if lines.is_empty() {
                        "the file does not look like a crash-generator log".to_string()
                    } else {
                        format!(
                            "{}\n\nthe log header is incomplete; some checks may be skipped",
                            lines.join("\n")
                        )
                    },
                )
                .with_order(20),
            )
            .with_severity(Severity::Warning)
        };

        Ok(result.with_duration(started.elapsed()))
    }
}
