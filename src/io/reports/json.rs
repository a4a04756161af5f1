//! JSON renderer.

use serde_json::{json, Value};
use tracing::warn;

use crate::core::errors::Result;
use crate::core::fragment::ReportFragment;

use super::composer::ComposedReport;

/// Render a composed report as a pretty-printed JSON document of shape
/// `{title, generatedAt, fragments: [...]}`. A fragment that fails to
/// serialise degrades to a placeholder object rather than aborting.
pub fn render(report: &ComposedReport) -> Result<String> {
    let fragments: Vec<Value> = report
        .fragments
        .iter()
        .map(|fragment| fragment_value(fragment))
        .collect();

    let document = json!({
        "title": report.title,
        "generatedAt": report.generated_at.to_rfc3339(),
        "fragments": fragments,
    });
    Ok(serde_json::to_string_pretty(&document)?)
}

fn fragment_value(fragment: &ReportFragment) -> Value {
    match serde_json::to_value(fragment) {
        Ok(value) => value,
        Err(err) => {
            warn!(fragment_id = %fragment.id, error = %err, "fragment failed to serialise");
            json!({
                "title": fragment.title,
                "error": "fragment could not be rendered",
            })
        }
    }
}
