//! Header comparison. Names are case-insensitive; only expected headers are
//! checked.

use super::matchers::apply_rules;
use super::mismatch::{Mismatch, MismatchKind};
use crate::model::{Category, HttpPart};
use serde_json::Value;

/// Join values and normalise whitespace around commas.
fn normalise(values: &[String]) -> String {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Content types compare without case or whitespace sensitivity.
fn normalise_content_type(value: &str) -> String {
    value
        .split(';')
        .map(|part| part.trim().to_ascii_lowercase().replace(' ', ""))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(";")
}

pub fn match_headers(expected: &impl HttpPart, actual: &impl HttpPart) -> Vec<Mismatch> {
    let Some(expected_headers) = expected.headers() else {
        return Vec::new();
    };
    let rules = expected.matching_rules();
    let mut mismatches = Vec::new();

    for (name, expected_values) in expected_headers {
        let expected_value = normalise(expected_values);
        let Some(actual_values) = actual.header(name) else {
            mismatches.push(Mismatch::new(
                MismatchKind::Header,
                name.as_str(),
                expected_value.as_str(),
                Value::Null,
                format!("Expected header '{name}' but was missing"),
            ));
            continue;
        };
        let actual_value = normalise(actual_values);

        let outcome = match rules.resolve_named(Category::Header, name) {
            Some(resolved) => apply_rules(
                &resolved,
                &Value::String(expected_value.clone()),
                &Value::String(actual_value.clone()),
            )
            .map_err(|descriptions| descriptions.join("; ")),
            None => {
                let equal = if name.eq_ignore_ascii_case("content-type") {
                    normalise_content_type(&expected_value) == normalise_content_type(&actual_value)
                } else {
                    expected_value == actual_value
                };
                if equal {
                    Ok(())
                } else {
                    Err(format!(
                        "Expected header '{name}' to have value '{expected_value}' but was '{actual_value}'"
                    ))
                }
            }
        };

        if let Err(description) = outcome {
            mismatches.push(Mismatch::new(
                MismatchKind::Header,
                name.as_str(),
                expected_value,
                actual_value,
                description,
            ));
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpPartBuilder, MatchingRules, Request};
    use serde_json::json;

    fn request_with(headers: &[(&str, &str)]) -> Request {
        let mut request = Request::default();
        for (name, value) in headers {
            request.with_header(name, 0, *value);
        }
        request
    }

    #[test]
    fn test_names_are_case_insensitive_and_extras_ignored() {
        let expected = request_with(&[("Accept", "application/json")]);
        let actual = request_with(&[("accept", "application/json"), ("x-extra", "1")]);
        assert!(match_headers(&expected, &actual).is_empty());
    }

    #[test]
    fn test_whitespace_around_commas() {
        let expected = request_with(&[("Accept", "a,b")]);
        let actual = request_with(&[("accept", "a ,  b")]);
        assert!(match_headers(&expected, &actual).is_empty());
    }

    #[test]
    fn test_content_type_parameters() {
        let expected = request_with(&[("Content-Type", "application/json; charset=UTF-8")]);
        let actual = request_with(&[("content-type", "application/json;charset=utf-8")]);
        assert!(match_headers(&expected, &actual).is_empty());
    }

    #[test]
    fn test_missing_and_different() {
        let expected = request_with(&[("X-A", "1"), ("X-B", "2")]);
        let actual = request_with(&[("x-b", "3")]);
        let mismatches = match_headers(&expected, &actual);
        assert_eq!(mismatches.len(), 2);
        assert_eq!(mismatches[0].path, "X-A");
        assert_eq!(mismatches[1].actual, json!("3"));
    }

    #[test]
    fn test_regex_rule_on_header() {
        let mut expected = request_with(&[("Date", "2020-01-01")]);
        expected.matching_rules = MatchingRules::from_json(
            "rules",
            &json!({"$.headers.Date": {"match": "regex", "regex": "\\d{4}-\\d{2}-\\d{2}"}}),
        )
        .unwrap();
        assert!(match_headers(&expected, &request_with(&[("date", "2024-05-06")])).is_empty());
        assert_eq!(match_headers(&expected, &request_with(&[("date", "today")])).len(), 1);
    }
}
