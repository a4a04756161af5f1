//! Self-contained HTML renderer with inline CSS.

use crate::core::fragment::{FragmentKind, FragmentVisibility, ReportFragment};

use super::composer::ComposedReport;

const STYLE: &str = r#"
body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 2rem auto; max-width: 60rem; color: #1b1b1b; }
h1, h2, h3, h4, h5, h6 { line-height: 1.25; }
.fragment { margin: 0.5rem 0; }
.fragment-info { border-left: 4px solid #2b6cb0; background: #ebf4ff; padding: 0.5rem 1rem; }
.fragment-warning { border-left: 4px solid #b7791f; background: #fffbea; padding: 0.5rem 1rem; }
.fragment-error { border-left: 4px solid #c53030; background: #fff5f5; padding: 0.5rem 1rem; }
.fragment-section, .fragment-container, .fragment-conditional { padding: 0; }
.generated-at { color: #718096; font-size: 0.85rem; }
pre { background: #f7fafc; padding: 0.75rem; overflow-x: auto; }
"#;

/// Render a composed report as a standalone HTML document.
pub fn render(report: &ComposedReport) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape(&report.title)));
    out.push_str(&format!("<style>{STYLE}</style>\n</head>\n<body>\n"));
    if !report.title.is_empty() {
        out.push_str(&format!("<h1>{}</h1>\n", escape(&report.title)));
    }
    out.push_str(&format!(
        "<p class=\"generated-at\">Generated: {}</p>\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for fragment in &report.fragments {
        render_into(&mut out, fragment, 2);
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn css_class(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Header => "fragment-header",
        FragmentKind::Section => "fragment-section",
        FragmentKind::Info => "fragment-info",
        FragmentKind::Warning => "fragment-warning",
        FragmentKind::Error => "fragment-error",
        FragmentKind::Container => "fragment-container",
        FragmentKind::Conditional => "fragment-conditional",
    }
}

fn render_into(out: &mut String, fragment: &ReportFragment, level: usize) {
    if fragment.visibility == FragmentVisibility::Hidden {
        return;
    }
    let level = level.min(6);

    out.push_str(&format!(
        "<div class=\"fragment {}\">\n",
        css_class(fragment.kind)
    ));
    if !fragment.title.is_empty() {
        out.push_str(&format!("<h{level}>{}</h{level}>\n", escape(&fragment.title)));
    }
    if !fragment.content.is_empty() {
        out.push_str(&format!("<p>{}</p>\n", escape(&fragment.content)));
    }
    for child in &fragment.children {
        render_into(out, child, level + 1);
    }
    out.push_str("</div>\n");
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
