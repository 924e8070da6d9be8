//! Declarative field-merge precedence table and its resolver.

use serde_json::{Map, Value};

/// The optional analytical sections subject to multi-source resolution.
pub const MERGE_FIELDS: [&str; 10] = [
    "transparency_data",
    "crisis_resilience_data",
    "peer_intelligence_data",
    "heir_management_data",
    "wealth_projection_data",
    "scenario_tree_data",
    "destination_drivers_data",
    "hnwi_trends_data",
    "risk_assessment",
    "mistakes",
];

/// Containers tried, in order, for each field. The bare entry means the
/// top level of the raw response.
const SOURCE_CONTAINERS: [Option<&str>; 4] =
    [Some("preview_data"), Some("memo_data"), Some("full_artifact"), None];

/// A value counts as present unless it is missing, `null`, or an object
/// with no keys. Older backend revisions emit `{}` for sections they did
/// not compute.
#[must_use]
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

/// Walks `path` down from `root`, returning the value if every segment
/// exists.
#[must_use]
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Resolves one field by the fixed precedence order, first non-empty
/// wins.
///
/// `full_artifact` is the separately fetched artifact, consulted when the
/// raw response does not embed one under its own `full_artifact` key.
#[must_use]
pub fn resolve_field(raw: &Value, full_artifact: Option<&Value>, field: &str) -> Option<Value> {
    for container in SOURCE_CONTAINERS {
        let candidate = match container {
            Some("full_artifact") => lookup(raw, &["full_artifact", field])
                .or_else(|| full_artifact.and_then(|fa| fa.get(field))),
            Some(key) => lookup(raw, &[key, field]),
            None => raw.get(field),
        };
        if let Some(value) = candidate {
            if is_present(value) {
                return Some(value.clone());
            }
        }
    }
    None
}

/// Runs the precedence table over every merge field, producing the
/// normalized preview mapping.
#[must_use]
pub fn merge_preview_data(raw: &Value, full_artifact: Option<&Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    for field in MERGE_FIELDS {
        if let Some(value) = resolve_field(raw, full_artifact, field) {
            merged.insert(field.to_string(), value);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn dedicated_field_wins_over_all_other_sources() {
        let raw = json!({
            "preview_data": {"transparency_data": {"score": "A"}},
            "memo_data": {"transparency_data": {"score": "B"}},
            "transparency_data": {"score": "C"},
        });
        let resolved = resolve_field(&raw, None, "transparency_data").unwrap();
        assert_eq!(resolved, json!({"score": "A"}));
    }

    #[test]
    fn memo_data_wins_over_top_level() {
        let raw = json!({
            "memo_data": {"risk_assessment": {"level": "B"}},
            "risk_assessment": {"level": "C"},
        });
        let resolved = resolve_field(&raw, None, "risk_assessment").unwrap();
        assert_eq!(resolved, json!({"level": "B"}));
    }

    #[test]
    fn empty_object_counts_as_absent() {
        let raw = json!({
            "preview_data": {"hnwi_trends_data": {}},
            "memo_data": {"hnwi_trends_data": {"trend": "up"}},
        });
        let resolved = resolve_field(&raw, None, "hnwi_trends_data").unwrap();
        assert_eq!(resolved, json!({"trend": "up"}));
    }

    #[test]
    fn null_counts_as_absent() {
        let raw = json!({
            "preview_data": {"mistakes": null},
            "mistakes": ["over-allocation"],
        });
        let resolved = resolve_field(&raw, None, "mistakes").unwrap();
        assert_eq!(resolved, json!(["over-allocation"]));
    }

    #[test]
    fn separately_fetched_artifact_is_consulted() {
        let raw = json!({});
        let artifact = json!({"scenario_tree_data": {"branches": 3}});
        let resolved = resolve_field(&raw, Some(&artifact), "scenario_tree_data").unwrap();
        assert_eq!(resolved, json!({"branches": 3}));
    }

    #[test]
    fn embedded_artifact_wins_over_separately_fetched() {
        let raw = json!({"full_artifact": {"scenario_tree_data": {"branches": 1}}});
        let artifact = json!({"scenario_tree_data": {"branches": 2}});
        let resolved = resolve_field(&raw, Some(&artifact), "scenario_tree_data").unwrap();
        assert_eq!(resolved, json!({"branches": 1}));
    }

    #[test]
    fn absent_everywhere_resolves_to_none() {
        let raw = json!({"preview_data": {}});
        assert!(resolve_field(&raw, None, "heir_management_data").is_none());
    }

    #[test]
    fn merge_covers_only_present_fields() {
        let raw = json!({
            "preview_data": {"transparency_data": {"score": "A"}},
            "risk_assessment": {"level": "C"},
        });
        let merged = merge_preview_data(&raw, None);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains_key("transparency_data"));
        assert!(merged.contains_key("risk_assessment"));
    }

    proptest! {
        /// Whatever value sits at the first-priority location is what the
        /// resolver returns, regardless of what the lower-priority
        /// locations hold.
        #[test]
        fn first_priority_always_wins(a in 0i64..1000, b in 0i64..1000, c in 0i64..1000) {
            let raw = json!({
                "preview_data": {"risk_assessment": {"v": a}},
                "memo_data": {"risk_assessment": {"v": b}},
                "risk_assessment": {"v": c},
            });
            let resolved = resolve_field(&raw, None, "risk_assessment").unwrap();
            prop_assert_eq!(resolved, json!({"v": a}));
        }
    }
}
