//! Plugin load-order extraction and validation.
//!
//! Crash logs end with a `PLUGINS:` section listing the load order with
//! hex index prefixes — `[08]` for full plugins, `[FE:023]` for light
//! plugins, `[FF]` once the full-plugin space is exhausted.

use std::time::Instant;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::analyzer::{AnalysisResult, Analyzer, Severity};
use crate::core::context::{keys, AnalysisContext};
use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;

static PLUGIN_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*\[((?:[0-9A-Fa-f]{2})(?::[0-9A-Fa-f]{3})?)\]\s+(.+?)\s*$")
        .expect("static regex")
});

/// Index of the full-plugin overflow marker.
const OVERFLOW_INDEX: &str = "FF";

/// Full plugins at or above this count sit at the engine's limit.
const FULL_PLUGIN_LIMIT: usize = 254;

/// One load-order entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    /// Load-order index as written (`08`, `FE:023`, `FF`).
    pub index: String,
    /// Plugin file name.
    pub name: String,
}

impl PluginEntry {
    /// True for `[FE:xxx]` light plugins.
    pub fn is_light(&self) -> bool {
        self.index.contains(':')
    }
}

/// Ordered plugin list published to shared data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginList {
    /// Entries in load order.
    pub entries: Vec<PluginEntry>,
}

impl PluginList {
    /// Parse the `PLUGINS:` section of a crash log. Returns an empty list
    /// when the section is absent.
    pub fn parse(content: &str) -> Self {
        let mut entries = Vec::new();
        let mut in_section = false;

        for line in content.lines() {
            if !in_section {
                if line.trim() == "PLUGINS:" {
                    in_section = true;
                }
                continue;
            }
            if let Some(captures) = PLUGIN_LINE_RE.captures(line) {
                entries.push(PluginEntry {
                    index: captures[1].to_uppercase(),
                    name: captures[2].to_string(),
                });
            } else if !line.trim().is_empty() {
                // First non-plugin line ends the section.
                break;
            }
        }

        Self { entries }
    }

    /// Number of full (non-light) plugins.
    pub fn full_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.is_light() && entry.index != OVERFLOW_INDEX)
            .count()
    }

    /// Number of `[FE:xxx]` light plugins.
    pub fn light_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_light()).count()
    }

    /// True when the `[FF]` overflow marker is present.
    pub fn has_overflow_marker(&self) -> bool {
        self.entries.iter().any(|entry| entry.index == OVERFLOW_INDEX)
    }
}

/// Extracts the plugin list and flags load-order limits.
#[derive(Debug, Default)]
pub struct PluginListAnalyzer;

#[async_trait]
impl Analyzer for PluginListAnalyzer {
    fn name(&self) -> &str {
        "plugin-load-order"
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn analyze(&self, ctx: &AnalysisContext) -> Result<AnalysisResult> {
        let started = Instant::now();
        let Some(content) = ctx.get::<String>(keys::LOG_CONTENT) else {
            return Ok(
                AnalysisResult::failure(self.name(), "crash log content was not loaded")
                    .with_duration(started.elapsed()),
            );
        };

        let plugins = PluginList::parse(&content);
        if plugins.entries.is_empty() {
            ctx.set(keys::PLUGIN_LIST, plugins);
            return Ok(AnalysisResult::quiet(self.name()).with_duration(started.elapsed()));
        }

        let mut severity = Severity::Info;
        let mut body = format!(
            "{} plugins loaded ({} full, {} light)",
            plugins.entries.len(),
            plugins.full_count(),
            plugins.light_count()
        );

        if plugins.has_overflow_marker() {
            severity = Severity::Critical;
            body.push_str(
                "\n\nthe [FF] marker is present: the full plugin space is \
                 exhausted and the game is loading past its limit",
            );
        } else if plugins.full_count() >= FULL_PLUGIN_LIMIT {
            severity = Severity::Warning;
            body.push_str(&format!(
                "\n\n{} full plugins sit at the engine limit of {FULL_PLUGIN_LIMIT}",
                plugins.full_count()
            ));
        }

        ctx.set(keys::PLUGIN_LIST, plugins);

        let fragment = match severity {
            Severity::Info => ReportFragment::section("Plugins", body).with_order(120),
            Severity::Warning => ReportFragment::warning("Plugins", body).with_order(60),
            _ => ReportFragment::error("Plugins", body).with_order(15),
        };

        Ok(AnalysisResult::success(self.name(), fragment)
            .with_severity(severity)
            .with_duration(started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::InMemorySettings;
    use std::sync::Arc;

    const LOG_WITH_PLUGINS: &str = "\
Fallout 4 v1.10.163
Buffout 4 v1.26.2

PLUGINS:
\t[00]     Fallout4.esm
\t[01]     DLCRobot.esm
\t[FE:000] ccbgsfo4001-pipboy(black).esl
\t[FE:001] lighter.esl
\t[08]     UnofficialPatch.esp
";

    #[test]
    fn parses_full_and_light_entries() {
        let plugins = PluginList::parse(LOG_WITH_PLUGINS);
        assert_eq!(plugins.entries.len(), 5);
        assert_eq!(plugins.full_count(), 3);
        assert_eq!(plugins.light_count(), 2);
        assert!(!plugins.has_overflow_marker());
        assert_eq!(plugins.entries[0].name, "Fallout4.esm");
        assert_eq!(plugins.entries[2].index, "FE:000");
    }

    #[test]
    fn missing_section_parses_empty() {
        let plugins = PluginList::parse("no plugin section here\n");
        assert!(plugins.entries.is_empty());
    }

    #[test]
    fn overflow_marker_is_detected() {
        let log = "PLUGINS:\n\t[FD] a.esp\n\t[FF] overflow.esp\n";
        let plugins = PluginList::parse(log);
        assert!(plugins.has_overflow_marker());
    }

    #[tokio::test]
    async fn publishes_list_and_reports_count() {
        let ctx = AnalysisContext::new("crash.log", None, Arc::new(InMemorySettings::new()));
        ctx.set(keys::LOG_CONTENT, LOG_WITH_PLUGINS.to_string());

        let result = PluginListAnalyzer.analyze(&ctx).await.expect("runs");
        assert!(result.success);
        assert_eq!(result.severity, Severity::Info);

        let published = ctx.get::<PluginList>(keys::PLUGIN_LIST).expect("published");
        assert_eq!(published.entries.len(), 5);

        let fragment = result.fragment.expect("fragment");
        assert!(fragment.content.contains("5 plugins loaded"));
    }

    #[tokio::test]
    async fn overflow_escalates_to_critical() {
        let ctx = AnalysisContext::new("crash.log", None, Arc::new(InMemorySettings::new()));
        ctx.set(
            keys::LOG_CONTENT,
            "PLUGINS:\n\t[00] a.esm\n\t[FF] b.esp\n".to_string(),
        );

        let result = PluginListAnalyzer.analyze(&ctx).await.expect("runs");
        assert_eq!(result.severity, Severity::Critical);
    }

    #[tokio::test]
    async fn no_plugins_is_quiet() {
        let ctx = AnalysisContext::new("crash.log", None, Arc::new(InMemorySettings::new()));
        ctx.set(keys::LOG_CONTENT, "just text\n".to_string());

        let result = PluginListAnalyzer.analyze(&ctx).await.expect("runs");
        assert!(result.success);
        assert!(result.fragment.is_none());
    }
}
