//! Plain-text renderer.

use crate::core::fragment::{FragmentKind, FragmentVisibility, ReportFragment};

use super::composer::ComposedReport;

/// Render a composed report as plain text with underlined headings:
/// `=====` under the report title, `-----` under section titles.
pub fn render(report: &ComposedReport) -> String {
    let mut out = String::new();
    if !report.title.is_empty() {
        out.push_str(&report.title);
        out.push('\n');
        out.push_str(&"=".repeat(report.title.chars().count()));
        out.push_str("\n\n");
    }
    out.push_str(&format!(
        "Generated: {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for fragment in &report.fragments {
        render_into(&mut out, fragment);
    }
    out
}

fn label(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Warning => "[WARNING] ",
        FragmentKind::Error => "[ERROR] ",
        FragmentKind::Info => "[INFO] ",
        _ => "",
    }
}

fn render_into(out: &mut String, fragment: &ReportFragment) {
    if fragment.visibility == FragmentVisibility::Hidden {
        return;
    }

    if !fragment.title.is_empty() {
        let heading = format!("{}{}", label(fragment.kind), fragment.title);
        out.push_str(&heading);
        out.push('\n');
        out.push_str(&"-".repeat(heading.chars().count()));
        out.push_str("\n\n");
    } else if !fragment.content.is_empty() && !label(fragment.kind).is_empty() {
        out.push_str(label(fragment.kind));
    }

    if !fragment.content.is_empty() {
        out.push_str(&fragment.content);
        out.push_str("\n\n");
    }

    for child in &fragment.children {
        render_into(out, child);
    }
}
