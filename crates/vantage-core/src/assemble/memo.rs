//! Top-level assembly of the memo payload handed to presentation.

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::cross_border;
use super::merge::{is_present, lookup, merge_preview_data};
use super::via_negativa::{self, ViaNegativa};

/// Compliance flag under which theoretical tax savings must never be
/// shown.
pub const FULL_WORLDWIDE_TAXATION: &str = "FULL_WORLDWIDE_TAXATION";

/// Counts of matched intelligence inputs, used only for footer display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IntelligenceSources {
    /// Market/regulatory developments analyzed.
    pub developments_analyzed: u64,
    /// Failure patterns matched against this intake.
    pub failure_patterns_matched: u64,
    /// Rules applied during generation.
    pub rules_applied: u64,
}

impl IntelligenceSources {
    fn from_artifact(full_artifact: Option<&Value>) -> Option<Self> {
        let artifact = full_artifact?;
        let sources = artifact
            .get("intelligence_sources")
            .or_else(|| artifact.get("intelligenceSources"))
            .filter(|v| is_present(v))?;
        let count = |key: &str| sources.get(key).and_then(Value::as_u64).unwrap_or(0);
        Some(Self {
            developments_analyzed: count("developments_analyzed"),
            failure_patterns_matched: count("failure_patterns_matched"),
            rules_applied: count("rules_applied"),
        })
    }
}

/// The pipeline's output; not persisted, rebuilt on every successful
/// full-content fetch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledMemoData {
    /// The intake this memo belongs to.
    pub intake_id: String,
    /// Normalized preview mapping from the precedence table.
    pub preview_data: Map<String, Value>,
    /// Backend `memo_data` pass-through, or a synthesized stand-in from
    /// intelligence counts; `Null` when neither exists.
    pub memo_data: Value,
    /// Cross-border audit summary, supplied or synthesized.
    pub cross_border_audit_summary: Option<Value>,
    /// Whether theoretical tax savings may be displayed.
    pub show_tax_savings: bool,
    /// Adverse-framing context for do-not-proceed verdicts.
    pub via_negativa: Option<ViaNegativa>,
    /// Footer counts, when the full artifact carried them.
    pub intelligence_sources: Option<IntelligenceSources>,
}

/// Runs the whole pipeline. Infallible by construction: missing inputs
/// yield absent fields, never errors.
#[must_use]
pub fn assemble(intake_id: &str, raw: &Value, full_artifact: Option<&Value>) -> AssembledMemoData {
    let preview_data = merge_preview_data(raw, full_artifact);
    let intelligence_sources = IntelligenceSources::from_artifact(full_artifact);
    let precedent_count =
        intelligence_sources.map_or(0, |sources| sources.failure_patterns_matched);

    let memo = AssembledMemoData {
        intake_id: intake_id.to_string(),
        cross_border_audit_summary: cross_border::resolve_summary(raw, full_artifact),
        show_tax_savings: tax_savings_visible(raw, &preview_data),
        via_negativa: via_negativa::derive(raw, full_artifact, precedent_count),
        memo_data: memo_data(raw, intelligence_sources),
        intelligence_sources,
        preview_data,
    };
    debug!(
        intake_id,
        sections = memo.preview_data.len(),
        adverse = memo.via_negativa.is_some(),
        "memo assembled"
    );
    memo
}

fn memo_data(raw: &Value, sources: Option<IntelligenceSources>) -> Value {
    if let Some(supplied) = raw.get("memo_data").filter(|v| is_present(v)) {
        return supplied.clone();
    }
    match sources {
        Some(sources) => json!({
            "developments_analyzed": sources.developments_analyzed,
            "failure_patterns_matched": sources.failure_patterns_matched,
            "rules_applied": sources.rules_applied,
        }),
        None => Value::Null,
    }
}

/// Theoretical tax savings are suppressed under full worldwide taxation
/// or an explicit backend opt-out; absence of the flag defaults to show.
fn tax_savings_visible(raw: &Value, preview: &Map<String, Value>) -> bool {
    if worldwide_taxation(raw, preview) {
        return false;
    }
    for candidate in [
        lookup(raw, &["preview_data", "show_tax_savings"]),
        lookup(raw, &["memo_data", "show_tax_savings"]),
        raw.get("show_tax_savings"),
    ] {
        if let Some(flag) = candidate.and_then(Value::as_bool) {
            return flag;
        }
    }
    true
}

fn worldwide_taxation(raw: &Value, preview: &Map<String, Value>) -> bool {
    let flags = preview
        .get("transparency_data")
        .and_then(|t| t.get("compliance_flags"))
        .or_else(|| raw.get("compliance_flags"))
        .and_then(Value::as_array);
    flags.is_some_and(|flags| {
        flags
            .iter()
            .filter_map(Value::as_str)
            .any(|flag| flag == FULL_WORLDWIDE_TAXATION)
    })
}
