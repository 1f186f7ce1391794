//! Query comparison: key-based, value order significant within a key.

use super::matchers::{apply_rules, check_bounds};
use super::mismatch::{Mismatch, MismatchKind};
use crate::model::{Category, MatchingRules, QueryMap};
use serde_json::{json, Value};

pub fn match_query(
    rules: &MatchingRules,
    expected: Option<&QueryMap>,
    actual: Option<&QueryMap>,
) -> Vec<Mismatch> {
    let Some(expected) = expected else {
        return Vec::new();
    };
    let mut mismatches = Vec::new();

    for (key, expected_values) in expected {
        let Some(actual_values) = actual.and_then(|query| query.get(key)) else {
            mismatches.push(Mismatch::new(
                MismatchKind::Query,
                key.as_str(),
                json!(expected_values),
                Value::Null,
                format!("Expected query parameter '{key}' but was missing"),
            ));
            continue;
        };

        let mismatch = |description: String| {
            Mismatch::new(
                MismatchKind::Query,
                key.as_str(),
                json!(expected_values),
                json!(actual_values),
                description,
            )
        };

        match rules.resolve_named(Category::Query, key) {
            Some(resolved) => {
                if let Some((min, max)) = resolved.min_max() {
                    if let Err(description) = check_bounds(actual_values.len(), min, max) {
                        mismatches.push(mismatch(format!(
                            "Query parameter '{key}': {description}"
                        )));
                    }
                }
                let Some(first) = expected_values.first() else {
                    continue;
                };
                for (index, actual_value) in actual_values.iter().enumerate() {
                    let template = expected_values.get(index).unwrap_or(first);
                    if let Err(descriptions) = apply_rules(
                        &resolved,
                        &Value::String(template.clone()),
                        &Value::String(actual_value.clone()),
                    ) {
                        mismatches.push(mismatch(format!(
                            "Query parameter '{key}' value {index}: {}",
                            descriptions.join("; ")
                        )));
                    }
                }
            }
            None if expected_values.len() != actual_values.len() => {
                mismatches.push(mismatch(format!(
                    "Expected query parameter '{key}' with {} value(s) {:?} but received {} value(s) {:?}",
                    expected_values.len(),
                    expected_values,
                    actual_values.len(),
                    actual_values
                )));
            }
            None => {
                for (index, (expected_value, actual_value)) in
                    expected_values.iter().zip(actual_values).enumerate()
                {
                    if expected_value != actual_value {
                        mismatches.push(mismatch(format!(
                            "Expected '{expected_value}' but received '{actual_value}' for query parameter '{key}' at index {index}"
                        )));
                    }
                }
            }
        }
    }
    mismatches
}
