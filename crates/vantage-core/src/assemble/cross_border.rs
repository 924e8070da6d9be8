//! Cross-border audit summary synthesis.
//!
//! Newer backend revisions supply `cross_border_audit_summary` directly;
//! older ones only ship the wealth-projection starting position and,
//! sometimes, a real-asset audit section. Synthesizing the summary from
//! those two structures keeps downstream presentation uniform regardless
//! of backend revision. When the inputs are also absent, the summary
//! stays absent: the pipeline never fabricates financial figures.

use serde_json::{Map, Value};

use super::merge::{is_present, lookup, resolve_field};

/// Returns the summary: verbatim if the backend supplied it, otherwise
/// synthesized, otherwise `None`.
#[must_use]
pub fn resolve_summary(raw: &Value, full_artifact: Option<&Value>) -> Option<Value> {
    if let Some(supplied) = lookup(raw, &["memo_data", "cross_border_audit_summary"])
        .or_else(|| raw.get("cross_border_audit_summary"))
    {
        if is_present(supplied) {
            return Some(supplied.clone());
        }
    }

    let projection = resolve_field(raw, full_artifact, "wealth_projection_data")?;
    let starting_position = projection.get("starting_position").filter(|v| is_present(v))?;
    let real_asset_audit = resolve_field(raw, full_artifact, "real_asset_audit");
    Some(synthesize(starting_position, real_asset_audit.as_ref()))
}

/// Deterministic assembly of the summary from the starting position and
/// the optional real-asset audit.
///
/// Key insertion order is fixed, so two runs over the same inputs yield
/// byte-identical serializations.
#[must_use]
pub fn synthesize(starting_position: &Value, real_asset_audit: Option<&Value>) -> Value {
    let mut summary = Map::new();
    summary.insert("starting_position".to_string(), starting_position.clone());
    if let Some(audit) = real_asset_audit.filter(|v| is_present(v)) {
        summary.insert("real_asset_audit".to_string(), audit.clone());
    }

    // Aggregate exposure only when the inputs actually carry numeric
    // totals; a missing side is omitted, never substituted.
    let declared = total_value(starting_position);
    let real = real_asset_audit.and_then(total_value);
    match (declared, real) {
        (Some(a), Some(b)) => {
            summary.insert("combined_exposure".to_string(), Value::from(a + b));
        },
        (Some(a), None) => {
            summary.insert("combined_exposure".to_string(), Value::from(a));
        },
        _ => {},
    }

    Value::Object(summary)
}

fn total_value(section: &Value) -> Option<f64> {
    section.get("total_value").and_then(Value::as_f64)
}
