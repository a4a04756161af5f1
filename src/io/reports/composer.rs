//! Report composer.
//!
//! Stateless per call: collects fragments out of analyzer results, adds the
//! requested meta-sections (errors, timing), applies visibility filtering
//! and order sorting, and hands the composed report to a format renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::analyzer::AnalysisResult;
use crate::core::errors::Result;
use crate::core::fragment::{FragmentVisibility, ReportFragment};

use super::{html, json, markdown, text};

#[cfg(test)]
#[path = "composer_tests.rs"]
mod tests;

/// Output format of a composed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReportFormat {
    /// GitHub-flavoured markdown.
    #[default]
    Markdown,
    /// Self-contained HTML document.
    Html,
    /// Machine-readable JSON.
    Json,
    /// Plain text with underlined headings.
    PlainText,
}

/// Composition options.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Output format.
    pub format: ReportFormat,
    /// Mention analyzers that ran but had nothing to report.
    pub include_skipped: bool,
    /// Append an errors section when any analyzer failed.
    pub include_errors: bool,
    /// Append a per-analyzer timing section.
    pub include_timing_info: bool,
    /// Carry fragment metadata into the output (JSON only).
    pub include_metadata: bool,
    /// Sort sibling fragments by their `order` before rendering.
    pub sort_by_order: bool,
    /// Most verbose visibility level to render.
    pub minimum_visibility: FragmentVisibility,
    /// Report title; a default is derived when absent.
    pub title: Option<String>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            format: ReportFormat::Markdown,
            include_skipped: false,
            include_errors: true,
            include_timing_info: false,
            include_metadata: false,
            sort_by_order: true,
            minimum_visibility: FragmentVisibility::Always,
            title: None,
        }
    }
}

/// A composed, renderable report.
#[derive(Debug, Clone, Serialize)]
pub struct ComposedReport {
    /// Report title.
    pub title: String,
    /// Composition timestamp.
    pub generated_at: DateTime<Utc>,
    /// Top-level fragments in render order.
    pub fragments: Vec<ReportFragment>,
}

/// Stateless composer over analyzer results.
#[derive(Debug, Default)]
pub struct ReportComposer;

impl ReportComposer {
    /// Compose and render a report from analyzer results.
    pub fn compose_report(results: &[AnalysisResult], options: &ReportOptions) -> Result<String> {
        let mut fragments: Vec<ReportFragment> = results
            .iter()
            .filter(|result| result.success)
            .filter_map(|result| result.fragment.clone())
            .collect();

        if options.include_skipped {
            let quiet: Vec<String> = results
                .iter()
                .filter(|r| r.success && r.fragment.is_none())
                .map(|r| r.analyzer_name.clone())
                .collect();
            if !quiet.is_empty() {
                fragments.push(
                    ReportFragment::info(
                        "Nothing To Report",
                        quiet
                            .iter()
                            .map(|name| format!("- {name}"))
                            .collect::<Vec<_>>()
                            .join("\n"),
                    )
                    .with_order(500),
                );
            }
        }

        if options.include_errors {
            if let Some(errors) = Self::errors_section(results) {
                fragments.push(errors);
            }
        }

        if options.include_timing_info {
            fragments.push(Self::timing_section(results));
        }

        Self::compose_from_fragments(fragments, options)
    }

    /// Filter, sort, and render pre-built fragments.
    pub fn compose_from_fragments(
        fragments: Vec<ReportFragment>,
        options: &ReportOptions,
    ) -> Result<String> {
        let mut fragments: Vec<ReportFragment> = fragments
            .into_iter()
            .filter(|fragment| fragment.visibility <= options.minimum_visibility)
            .filter(ReportFragment::has_content)
            .collect();

        if options.sort_by_order {
            fragments.sort_by_key(|fragment| fragment.order);
        }

        let report = ComposedReport {
            title: options
                .title
                .clone()
                .unwrap_or_else(|| "Scanner111 Analysis Report".to_string()),
            generated_at: Utc::now(),
            fragments,
        };

        Ok(match options.format {
            ReportFormat::Markdown => markdown::render(&report),
            ReportFormat::Html => html::render(&report),
            ReportFormat::Json => json::render(&report)?,
            ReportFormat::PlainText => text::render(&report),
        })
    }

    fn errors_section(results: &[AnalysisResult]) -> Option<ReportFragment> {
        let failed: Vec<&AnalysisResult> = results.iter().filter(|r| !r.success).collect();
        if failed.is_empty() {
            return None;
        }

        let body = failed
            .iter()
            .map(|result| {
                let details = if result.errors.is_empty() {
                    "unknown failure".to_string()
                } else {
                    result.errors.join("; ")
                };
                format!("- {}: {details}", result.analyzer_name)
            })
            .collect::<Vec<_>>()
            .join("\n");

        Some(ReportFragment::error("Analyzer Errors", body).with_order(400))
    }

    fn timing_section(results: &[AnalysisResult]) -> ReportFragment {
        let body = results
            .iter()
            .map(|result| {
                format!(
                    "- {}: {:.1} ms{}",
                    result.analyzer_name,
                    result.duration.as_secs_f64() * 1000.0,
                    if result.success { "" } else { " (failed)" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        ReportFragment::info("Performance", body).with_order(600)
    }
}
