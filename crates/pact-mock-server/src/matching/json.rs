//! Recursive structural comparison of JSON bodies.

use super::body::compare_leaf;
use super::matchers::{apply_rules, check_bounds};
use super::mismatch::{Mismatch, MismatchKind};
use crate::model::rules::ResolvedRules;
use crate::model::{Category, DocPath, MatchingRule, MatchingRules};
use serde_json::{Map, Value};

pub(crate) fn match_json(rules: &MatchingRules, expected: &[u8], actual: &[u8]) -> Vec<Mismatch> {
    let expected: Value = match serde_json::from_slice(expected) {
        Ok(value) => value,
        Err(e) => return vec![parse_failure("expected", e, expected)],
    };
    let actual: Value = match serde_json::from_slice(actual) {
        Ok(value) => value,
        Err(e) => return vec![parse_failure("actual", e, actual)],
    };

    let mut mismatches = Vec::new();
    compare_values(rules, &DocPath::root(), &expected, &actual, &mut mismatches);
    mismatches
}

fn parse_failure(which: &str, error: serde_json::Error, bytes: &[u8]) -> Mismatch {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let (expected, actual) = if which == "expected" {
        (Value::String(text), Value::Null)
    } else {
        (Value::Null, Value::String(text))
    };
    Mismatch::new(
        MismatchKind::Body,
        "$",
        expected,
        actual,
        format!("Failed to parse the {which} body as JSON: {error}"),
    )
}

/// Compare `actual` against `expected` at `path`, appending to `mismatches`.
pub(crate) fn compare_values(
    rules: &MatchingRules,
    path: &DocPath,
    expected: &Value,
    actual: &Value,
    mismatches: &mut Vec<Mismatch>,
) {
    let resolved = rules.resolve(Category::Body, path);

    // A value rule declared on a container judges the whole container.
    if let Some(resolved) = resolved.filter(|r| !r.inherited && has_value_rule(r)) {
        if expected.is_array() || expected.is_object() {
            if let Err(descriptions) = apply_rules(&resolved, expected, actual) {
                mismatches.push(Mismatch::new(
                    MismatchKind::Body,
                    path.to_string(),
                    expected.clone(),
                    actual.clone(),
                    descriptions.join("; "),
                ));
            }
            return;
        }
    }

    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            compare_objects(rules, path, resolved, expected, actual, mismatches)
        }
        (Value::Array(expected), Value::Array(actual)) => {
            compare_arrays(rules, path, resolved, expected, actual, mismatches)
        }
        _ => compare_leaf(rules, path, expected, actual, mismatches),
    }
}

fn has_value_rule(resolved: &ResolvedRules<'_>) -> bool {
    resolved.rules().any(|rule| {
        matches!(
            rule,
            MatchingRule::Equality | MatchingRule::Regex(_) | MatchingRule::Include(_)
        )
    })
}

fn compare_objects(
    rules: &MatchingRules,
    path: &DocPath,
    resolved: Option<ResolvedRules<'_>>,
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
    mismatches: &mut Vec<Mismatch>,
) {
    let allow_unexpected = resolved.is_some_and(|r| r.has_type());

    for (key, expected_value) in expected {
        let child = path.join(key.clone());
        match actual.get(key) {
            Some(actual_value) => compare_values(rules, &child, expected_value, actual_value, mismatches),
            None => mismatches.push(Mismatch::new(
                MismatchKind::Body,
                child.to_string(),
                expected_value.clone(),
                Value::Null,
                format!("Expected key '{key}' but was missing"),
            )),
        }
    }

    if !allow_unexpected {
        for (key, actual_value) in actual {
            if !expected.contains_key(key) {
                mismatches.push(Mismatch::new(
                    MismatchKind::Body,
                    path.join(key.clone()).to_string(),
                    Value::Null,
                    actual_value.clone(),
                    format!("Unexpected key '{key}'"),
                ));
            }
        }
    }
}

fn compare_arrays(
    rules: &MatchingRules,
    path: &DocPath,
    resolved: Option<ResolvedRules<'_>>,
    expected: &[Value],
    actual: &[Value],
    mismatches: &mut Vec<Mismatch>,
) {
    let length_mismatch = |description: String| {
        Mismatch::new(
            MismatchKind::Body,
            path.to_string(),
            Value::Array(expected.to_vec()),
            Value::Array(actual.to_vec()),
            description,
        )
    };

    match resolved {
        Some(resolved) if resolved.has_type() => {
            if let Some((min, max)) = resolved.min_max() {
                if let Err(description) = check_bounds(actual.len(), min, max) {
                    mismatches.push(length_mismatch(description));
                }
            }
            compare_against_template(rules, path, expected, actual, mismatches);
        }
        _ => {
            if expected.len() != actual.len() {
                mismatches.push(length_mismatch(format!(
                    "Expected an array of {} item(s) but received {}",
                    expected.len(),
                    actual.len()
                )));
            }
            for (index, (expected_item, actual_item)) in expected.iter().zip(actual).enumerate() {
                compare_values(rules, &path.join_index(index), expected_item, actual_item, mismatches);
            }
        }
    }
}

/// Compare each actual element with the expected element at the same index,
/// or with the first expected element once past the end.
fn compare_against_template(
    rules: &MatchingRules,
    path: &DocPath,
    expected: &[Value],
    actual: &[Value],
    mismatches: &mut Vec<Mismatch>,
) {
    let Some(first) = expected.first() else {
        return;
    };
    for (index, actual_item) in actual.iter().enumerate() {
        let template = expected.get(index).unwrap_or(first);
        compare_values(rules, &path.join_index(index), template, actual_item, mismatches);
    }
}
