//! Markdown renderer.

use crate::core::fragment::{FragmentKind, FragmentVisibility, ReportFragment};

use super::composer::ComposedReport;

/// Render a whole composed report.
pub fn render(report: &ComposedReport) -> String {
    let mut out = String::new();
    if !report.title.is_empty() {
        out.push_str(&format!("# {}\n\n", report.title));
    }
    out.push_str(&format!(
        "Generated: {}\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    for fragment in &report.fragments {
        render_into(&mut out, fragment, 2);
    }
    out
}

/// Render a single fragment tree, starting at heading level 1.
pub fn render_fragment(fragment: &ReportFragment) -> String {
    let mut out = String::new();
    render_into(&mut out, fragment, 1);
    out
}

fn type_prefix(kind: FragmentKind) -> &'static str {
    match kind {
        FragmentKind::Warning => "⚠️ ",
        FragmentKind::Error => "❌ ",
        FragmentKind::Info => "ℹ️ ",
        _ => "",
    }
}

fn render_into(out: &mut String, fragment: &ReportFragment, level: usize) {
    if fragment.visibility == FragmentVisibility::Hidden {
        return;
    }

    // Markdown heading depth tops out at six.
    let level = level.min(6);

    match fragment.kind {
        FragmentKind::Header
        | FragmentKind::Section
        | FragmentKind::Container
        | FragmentKind::Conditional => {
            if !fragment.title.is_empty() {
                out.push_str(&"#".repeat(level));
                out.push(' ');
                out.push_str(&fragment.title);
                out.push_str("\n\n");
            }
            if !fragment.content.is_empty() {
                out.push_str(&fragment.content);
                out.push_str("\n\n");
            }
        }
        FragmentKind::Info | FragmentKind::Warning | FragmentKind::Error => {
            let prefix = type_prefix(fragment.kind);
            if !fragment.title.is_empty() {
                out.push_str(&format!("{prefix}**{}**\n\n", fragment.title));
            } else if !prefix.is_empty() && !fragment.content.is_empty() {
                out.push_str(prefix);
            }
            if !fragment.content.is_empty() {
                out.push_str(&fragment.content);
                out.push_str("\n\n");
            }
        }
    }

    for child in &fragment.children {
        render_into(out, child, level + 1);
    }
}
