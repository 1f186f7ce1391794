//! Body comparison: dispatch on content kind.

use super::matchers::{apply_rules, describe};
use super::mismatch::{Mismatch, MismatchKind};
use super::{json, xml};
use crate::model::{BodyKind, Category, DocPath, HttpPart, MatchingRules, OptionalBody};
use serde_json::Value;

/// Compare two scalar (or shape-mismatched) values at `path`, honouring any
/// body rule in force there. Failures produce one mismatch for the path.
pub(crate) fn compare_leaf(
    rules: &MatchingRules,
    path: &DocPath,
    expected: &Value,
    actual: &Value,
    mismatches: &mut Vec<Mismatch>,
) {
    let outcome = match rules.resolve(Category::Body, path) {
        Some(resolved) => apply_rules(&resolved, expected, actual),
        None if expected == actual => Ok(()),
        None => Err(vec![format!(
            "Expected {} but received {}",
            describe(expected),
            describe(actual)
        )]),
    };
    if let Err(descriptions) = outcome {
        mismatches.push(Mismatch::new(
            MismatchKind::Body,
            path.to_string(),
            expected.clone(),
            actual.clone(),
            descriptions.join("; "),
        ));
    }
}

fn body_mismatch(description: impl Into<String>, expected: &OptionalBody, actual: &OptionalBody) -> Mismatch {
    Mismatch::new(
        MismatchKind::Body,
        "$",
        expected.to_json_value(),
        actual.to_json_value(),
        description,
    )
}

/// Compare the bodies of two HTTP parts.
pub fn match_body(expected: &impl HttpPart, actual: &impl HttpPart) -> Vec<Mismatch> {
    let expected_body = expected.body();
    let actual_body = actual.body();

    match (expected_body, actual_body) {
        (OptionalBody::Absent, _) => Vec::new(),
        (OptionalBody::Empty, OptionalBody::Present(bytes, _)) => vec![body_mismatch(
            format!("Expected an empty body but received {} byte(s)", bytes.len()),
            expected_body,
            actual_body,
        )],
        (OptionalBody::Empty, _) => Vec::new(),
        (OptionalBody::Present(..), OptionalBody::Absent | OptionalBody::Empty) => {
            vec![body_mismatch(
                "Expected a body but received none",
                expected_body,
                actual_body,
            )]
        }
        (
            OptionalBody::Present(expected_bytes, expected_type),
            OptionalBody::Present(actual_bytes, actual_type),
        ) => {
            let kind = expected_type.kind();
            if kind != actual_type.kind() {
                return vec![Mismatch::new(
                    MismatchKind::BodyType,
                    "$",
                    expected_type.essence(),
                    actual_type.essence(),
                    format!(
                        "Expected a body of type '{}' but received '{}'",
                        expected_type.essence(),
                        actual_type.essence()
                    ),
                )];
            }

            let rules = expected.matching_rules();
            match kind {
                BodyKind::Json => json::match_json(rules, expected_bytes, actual_bytes),
                BodyKind::Xml => xml::match_xml(rules, expected_bytes, actual_bytes),
                BodyKind::Text | BodyKind::Binary => {
                    match_raw(rules, expected_body, actual_body)
                }
            }
        }
    }
}

/// Plain text and binary: byte equality, unless a rule sits on the body root.
fn match_raw(rules: &MatchingRules, expected: &OptionalBody, actual: &OptionalBody) -> Vec<Mismatch> {
    let root = DocPath::root();
    if let Some(resolved) = rules.resolve(Category::Body, &root) {
        let expected_text = Value::String(expected.as_text().into_owned());
        let actual_text = Value::String(actual.as_text().into_owned());
        return match apply_rules(&resolved, &expected_text, &actual_text) {
            Ok(()) => Vec::new(),
            Err(descriptions) => vec![body_mismatch(descriptions.join("; "), expected, actual)],
        };
    }

    if expected.bytes() == actual.bytes() {
        Vec::new()
    } else {
        vec![body_mismatch(
            format!(
                "Expected body '{}' but received '{}'",
                expected.as_text(),
                actual.as_text()
            ),
            expected,
            actual,
        )]
    }
}
