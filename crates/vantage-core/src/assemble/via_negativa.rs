//! Adverse-framing ("via negativa") presentation context.
//!
//! Derived only when the structure-optimization verdict equals the
//! do-not-proceed sentinel. Numeric values come from the backend object
//! when supplied; a missing value falls back to a locally computed
//! equivalent. A backend zero is treated as "no value supplied" and
//! still falls through to local computation, so a synthesized zero never
//! masks a real backend-computed exposure.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::merge::{is_present, lookup, resolve_field};

/// The structure-optimization verdict that triggers adverse framing.
pub const DO_NOT_PROCEED: &str = "DO_NOT_PROCEED";

/// Default badge when the backend supplies no label.
pub const DEFAULT_BADGE: &str = "ELEVATED RISK";

/// Pass/fail gates shown alongside the adverse framing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureGates {
    /// Tax-efficiency gate.
    pub tax_efficiency: bool,
    /// Liquidity gate.
    pub liquidity: bool,
    /// Structure gate.
    pub structure: bool,
}

/// The derived adverse-framing context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViaNegativa {
    /// Day-one capital loss, percent of net worth.
    pub day_one_loss_pct: Option<f64>,
    /// Day-one capital loss, absolute minor-unit-free amount.
    pub day_one_loss_amount: Option<f64>,
    /// Aggregate regulatory exposure in dollars.
    pub regulatory_exposure: Option<f64>,
    /// Pass/fail gates.
    pub gates: FailureGates,
    /// Badge text.
    pub badge_label: String,
    /// Header text with computed placeholders substituted.
    pub headline: String,
    /// Call-to-action copy.
    pub cta_label: String,
}

/// Derives the context, or `None` when the verdict is anything other
/// than the do-not-proceed sentinel.
///
/// `precedent_count` is the number of matched failure patterns reported
/// by the intelligence sources, used for headline substitution.
#[must_use]
pub fn derive(
    raw: &Value,
    full_artifact: Option<&Value>,
    precedent_count: u64,
) -> Option<ViaNegativa> {
    let optimization = resolve_field(raw, full_artifact, "structure_optimization")?;
    if optimization.get("verdict").and_then(Value::as_str) != Some(DO_NOT_PROCEED) {
        return None;
    }

    let supplied = resolve_field(raw, full_artifact, "via_negativa");
    let supplied = supplied.as_ref();

    let local_amount = local_loss_amount(&optimization);
    let day_one_loss_amount = backend_number(supplied, "day_one_loss_amount").or(local_amount);
    let day_one_loss_pct = backend_number(supplied, "day_one_loss_pct")
        .or_else(|| local_loss_pct(raw, full_artifact, local_amount));
    let regulatory_exposure = backend_number(supplied, "regulatory_exposure")
        .or_else(|| max_dollar_in_warnings(raw, full_artifact, &optimization));

    Some(ViaNegativa {
        day_one_loss_pct,
        day_one_loss_amount,
        regulatory_exposure,
        gates: resolve_gates(supplied, &optimization),
        badge_label: backend_label(supplied, "badge_label")
            .unwrap_or_else(|| DEFAULT_BADGE.to_string()),
        headline: backend_label(supplied, "headline")
            .unwrap_or_else(|| default_headline(day_one_loss_pct, precedent_count)),
        cta_label: backend_label(supplied, "cta_label")
            .unwrap_or_else(|| "Review the adverse findings before proceeding".to_string()),
    })
}

/// Backend numeric, with zero treated as "no value supplied".
fn backend_number(supplied: Option<&Value>, key: &str) -> Option<f64> {
    supplied
        .and_then(|v| v.get(key))
        .and_then(Value::as_f64)
        .filter(|n| *n != 0.0)
}

fn backend_label(supplied: Option<&Value>, key: &str) -> Option<String> {
    supplied
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Locally computed day-one loss: setup plus first-year carrying cost of
/// the rejected structure.
fn local_loss_amount(optimization: &Value) -> Option<f64> {
    let setup = optimization.get("setup_cost").and_then(Value::as_f64);
    let first_year = optimization.get("first_year_cost").and_then(Value::as_f64);
    match (setup, first_year) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

/// Loss amount as a percentage of the declared starting net worth,
/// rounded to one decimal.
fn local_loss_pct(raw: &Value, full_artifact: Option<&Value>, amount: Option<f64>) -> Option<f64> {
    let amount = amount?;
    let projection = resolve_field(raw, full_artifact, "wealth_projection_data")?;
    let net_worth = lookup(&projection, &["starting_position", "total_value"])
        .and_then(Value::as_f64)
        .filter(|n| *n > 0.0)?;
    Some(round1(amount / net_worth * 100.0))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn resolve_gates(supplied: Option<&Value>, optimization: &Value) -> FailureGates {
    let backend_gates = supplied.and_then(|v| v.get("gates")).filter(|v| is_present(v));
    let gate = |name: &str, score_key: &str| {
        backend_gates
            .and_then(|g| g.get(name))
            .and_then(Value::as_bool)
            .unwrap_or_else(|| {
                // Local equivalent: a 0-100 score clears the gate at 50.
                // An absent score fails the gate.
                lookup(optimization, &["scores", score_key])
                    .and_then(Value::as_f64)
                    .is_some_and(|s| s >= 50.0)
            })
    };
    FailureGates {
        tax_efficiency: gate("tax_efficiency", "tax_efficiency"),
        liquidity: gate("liquidity", "liquidity"),
        structure: gate("structure", "structure"),
    }
}

fn default_headline(loss_pct: Option<f64>, precedent_count: u64) -> String {
    let loss = loss_pct.map_or_else(|| "material".to_string(), |pct| format!("{pct}%"));
    format!(
        "Projected day-one capital erosion of {loss} across {precedent_count} matched failure precedents"
    )
}

/// Largest dollar figure parseable out of the free-text warning strings
/// attached to the risk assessment and the structure optimization.
fn max_dollar_in_warnings(
    raw: &Value,
    full_artifact: Option<&Value>,
    optimization: &Value,
) -> Option<f64> {
    let mut best: Option<f64> = None;
    let mut scan = |section: Option<&Value>| {
        let Some(warnings) = section.and_then(|s| s.get("warnings")).and_then(Value::as_array)
        else {
            return;
        };
        for warning in warnings.iter().filter_map(Value::as_str) {
            for figure in dollar_figures(warning) {
                best = Some(best.map_or(figure, |b| b.max(figure)));
            }
        }
    };
    let risk = resolve_field(raw, full_artifact, "risk_assessment");
    scan(risk.as_ref());
    scan(Some(optimization));
    best
}

/// Extracts dollar figures from free text, honoring `K`/`M`/`B`
/// suffixes and thousands separators.
fn dollar_figures(text: &str) -> Vec<f64> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        #[allow(clippy::expect_used)]
        Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kKmMbB])?\b")
            .expect("static pattern compiles")
    });
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let digits = caps.get(1)?.as_str().replace(',', "");
            let base: f64 = digits.parse().ok()?;
            let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                Some(suffix) if suffix == "k" => 1e3,
                Some(suffix) if suffix == "m" => 1e6,
                Some(suffix) if suffix == "b" => 1e9,
                _ => 1.0,
            };
            Some(base * multiplier)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn adverse_raw() -> Value {
        json!({
            "preview_data": {
                "structure_optimization": {
                    "verdict": "DO_NOT_PROCEED",
                    "setup_cost": 100_000.0,
                    "first_year_cost": 23_000.0,
                    "warnings": ["Potential clawback of $75,000 under exit rules"],
                },
                "wealth_projection_data": {
                    "starting_position": {"total_value": 1_000_000.0},
                },
                "risk_assessment": {
                    "warnings": [
                        "Regulatory exposure up to $1.2M in aggregate",
                        "Penalty band $340,000 - $900,000",
                    ],
                },
            },
        })
    }

    #[test]
    fn non_adverse_verdict_yields_none() {
        let raw = json!({
            "preview_data": {"structure_optimization": {"verdict": "PROCEED"}},
        });
        assert!(derive(&raw, None, 4).is_none());
    }

    #[test]
    fn missing_optimization_yields_none() {
        assert!(derive(&json!({}), None, 4).is_none());
    }

    #[test]
    fn local_fallbacks_with_no_backend_object() {
        let context = derive(&adverse_raw(), None, 17).unwrap();
        assert_eq!(context.day_one_loss_amount, Some(123_000.0));
        assert_eq!(context.day_one_loss_pct, Some(12.3));
        // Largest dollar figure across all warning strings.
        assert_eq!(context.regulatory_exposure, Some(1_200_000.0));
        assert_eq!(context.badge_label, DEFAULT_BADGE);
        assert!(context.headline.contains("12.3%"));
        assert!(context.headline.contains("17"));
        // No scores anywhere: every gate fails.
        assert_eq!(context.gates, FailureGates::default());
    }

    #[test]
    fn backend_values_take_precedence() {
        let mut raw = adverse_raw();
        raw["preview_data"]["via_negativa"] = json!({
            "day_one_loss_pct": 9.9,
            "regulatory_exposure": 2_000_000.0,
            "badge_label": "SEVERE",
            "gates": {"liquidity": true},
        });
        let context = derive(&raw, None, 3).unwrap();
        assert_eq!(context.day_one_loss_pct, Some(9.9));
        assert_eq!(context.regulatory_exposure, Some(2_000_000.0));
        assert_eq!(context.badge_label, "SEVERE");
        assert!(context.gates.liquidity);
        assert!(!context.gates.structure);
        // Amount was not supplied: local computation still applies.
        assert_eq!(context.day_one_loss_amount, Some(123_000.0));
    }

    #[test]
    fn backend_zero_falls_through_to_local_computation() {
        let mut raw = adverse_raw();
        raw["preview_data"]["via_negativa"] = json!({
            "day_one_loss_pct": 0.0,
            "regulatory_exposure": 0,
        });
        let context = derive(&raw, None, 3).unwrap();
        assert_eq!(context.day_one_loss_pct, Some(12.3));
        assert_eq!(context.regulatory_exposure, Some(1_200_000.0));
    }

    #[test]
    fn gates_pass_on_local_scores() {
        let mut raw = adverse_raw();
        raw["preview_data"]["structure_optimization"]["scores"] = json!({
            "tax_efficiency": 72.0,
            "liquidity": 31.0,
            "structure": 50.0,
        });
        let context = derive(&raw, None, 0).unwrap();
        assert!(context.gates.tax_efficiency);
        assert!(!context.gates.liquidity);
        assert!(context.gates.structure);
    }

    #[test]
    fn headline_without_loss_pct_stays_unquantified() {
        let raw = json!({
            "preview_data": {
                "structure_optimization": {"verdict": "DO_NOT_PROCEED"},
            },
        });
        let context = derive(&raw, None, 5).unwrap();
        assert!(context.day_one_loss_pct.is_none());
        assert!(context.headline.contains("material"));
        assert!(context.headline.contains('5'));
    }

    #[test]
    fn dollar_parser_handles_suffixes_and_commas() {
        let figures = dollar_figures("fines of $1.5M, plus $20k and $3,250.75 in fees");
        assert_eq!(figures, vec![1_500_000.0, 20_000.0, 3_250.75]);
    }

    #[test]
    fn dollar_parser_ignores_unmarked_numbers() {
        assert!(dollar_figures("exposure of 500000 units").is_empty());
    }
}
