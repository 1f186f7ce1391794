//! Evaluation of individual matching rules against values.

use crate::model::rules::{MatchingRule, ResolvedRules, RuleLogic};
use serde_json::Value;

/// Short type name used in mismatch descriptions.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Render a value for a description: strings quoted, everything else as JSON.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

/// String form of a scalar; `None` for arrays and objects.
fn as_match_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn same_type(expected: &Value, actual: &Value) -> bool {
    std::mem::discriminant(expected) == std::mem::discriminant(actual)
}

/// Apply one rule. `Err` carries a human readable description.
pub(crate) fn apply_rule(rule: &MatchingRule, expected: &Value, actual: &Value) -> Result<(), String> {
    match rule {
        MatchingRule::Equality => {
            if expected == actual {
                Ok(())
            } else {
                Err(format!(
                    "Expected {} to be equal to {}",
                    describe(actual),
                    describe(expected)
                ))
            }
        }
        MatchingRule::Type => {
            if same_type(expected, actual) {
                Ok(())
            } else {
                Err(format!(
                    "Expected {} ({}) to be the same type as {} ({})",
                    describe(actual),
                    type_name(actual),
                    describe(expected),
                    type_name(expected)
                ))
            }
        }
        MatchingRule::Regex(regex) => match as_match_string(actual) {
            Some(s) if regex.is_match(&s) => Ok(()),
            Some(s) => Err(format!("Expected '{s}' to match '{}'", regex.pattern())),
            None => Err(format!(
                "Expected {} to match '{}' but regexes only apply to scalar values",
                type_name(actual),
                regex.pattern()
            )),
        },
        MatchingRule::Include(needle) => match as_match_string(actual) {
            Some(s) if s.contains(needle.as_str()) => Ok(()),
            Some(s) => Err(format!("Expected '{s}' to include '{needle}'")),
            None => Err(format!(
                "Expected {} to include '{needle}' but includes only apply to scalar values",
                type_name(actual)
            )),
        },
        MatchingRule::MinMax { min, max } => match actual {
            Value::Array(items) => check_bounds(items.len(), *min, *max),
            _ => apply_rule(&MatchingRule::Type, expected, actual),
        },
    }
}

/// Check a collection size against optional bounds.
pub(crate) fn check_bounds(len: usize, min: Option<usize>, max: Option<usize>) -> Result<(), String> {
    if let Some(min) = min {
        if len < min {
            return Err(format!("Expected at least {min} item(s) but received {len}"));
        }
    }
    if let Some(max) = max {
        if len > max {
            return Err(format!("Expected at most {max} item(s) but received {len}"));
        }
    }
    Ok(())
}

/// Apply every rule in force, combining the outcomes with the list's logic.
pub(crate) fn apply_rules(rules: &ResolvedRules<'_>, expected: &Value, actual: &Value) -> Result<(), Vec<String>> {
    let mut failures = Vec::new();
    let mut any_passed = false;
    let mut any_applied = false;

    for rule in rules.rules() {
        any_applied = true;
        match apply_rule(rule, expected, actual) {
            Ok(()) => any_passed = true,
            Err(description) => failures.push(description),
        }
    }

    if !any_applied {
        return if expected == actual {
            Ok(())
        } else {
            Err(vec![format!(
                "Expected {} but received {}",
                describe(expected),
                describe(actual)
            )])
        };
    }

    match rules.logic() {
        RuleLogic::And if failures.is_empty() => Ok(()),
        RuleLogic::Or if any_passed => Ok(()),
        _ => Err(failures),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::rules::RegexRule;
    use serde_json::json;

    #[test]
    fn test_type_rule() {
        assert!(apply_rule(&MatchingRule::Type, &json!("a"), &json!("b")).is_ok());
        assert!(apply_rule(&MatchingRule::Type, &json!(1), &json!(2.5)).is_ok());
        assert!(apply_rule(&MatchingRule::Type, &json!(1), &json!("1")).is_err());
        assert!(apply_rule(&MatchingRule::Type, &json!({}), &json!([])).is_err());
    }

    #[test]
    fn test_regex_rule_on_scalars() {
        let rule = MatchingRule::Regex(RegexRule::new("\\d+").unwrap());
        assert!(apply_rule(&rule, &json!("1"), &json!("123")).is_ok());
        assert!(apply_rule(&rule, &json!(1), &json!(42)).is_ok());
        assert!(apply_rule(&rule, &json!("1"), &json!("x1")).is_err());
        assert!(apply_rule(&rule, &json!("1"), &json!([1])).is_err());
    }

    #[test]
    fn test_include_rule() {
        let rule = MatchingRule::Include("good".into());
        assert!(apply_rule(&rule, &json!(""), &json!("some good stuff")).is_ok());
        assert!(apply_rule(&rule, &json!(""), &json!("bad stuff")).is_err());
    }

    #[test]
    fn test_min_max_rule() {
        let rule = MatchingRule::MinMax { min: Some(1), max: Some(2) };
        assert!(apply_rule(&rule, &json!([1]), &json!([1, 2])).is_ok());
        assert!(apply_rule(&rule, &json!([1]), &json!([])).is_err());
        assert!(apply_rule(&rule, &json!([1]), &json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_bounds_messages() {
        assert_eq!(
            check_bounds(0, Some(1), None).unwrap_err(),
            "Expected at least 1 item(s) but received 0"
        );
        assert!(check_bounds(5, None, None).is_ok());
    }
}
