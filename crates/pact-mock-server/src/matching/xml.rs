//! Structural comparison of XML bodies.
//!
//! Documents are parsed with `sxd-document` and copied into an owned tree.
//! Paths address elements by name, then by position among same-name
//! siblings (`$.root.item[1]`), attributes as `@name` and text as `#text`.

use super::body::compare_leaf;
use super::matchers::check_bounds;
use super::mismatch::{Mismatch, MismatchKind};
use crate::model::{Category, DocPath, MatchingRules};
use serde_json::Value;
use std::collections::BTreeMap;
use sxd_document::dom::{ChildOfElement, ChildOfRoot, Element};
use sxd_document::parser;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn from_dom(element: Element<'_>) -> Self {
        let attributes = element
            .attributes()
            .into_iter()
            .map(|attr| (attr.name().local_part().to_string(), attr.value().to_string()))
            .collect();

        let mut text = String::new();
        let mut children = Vec::new();
        for child in element.children() {
            match child {
                ChildOfElement::Element(child) => children.push(XmlElement::from_dom(child)),
                ChildOfElement::Text(t) => text.push_str(t.text()),
                _ => {}
            }
        }

        XmlElement {
            name: element.name().local_part().to_string(),
            attributes,
            text: text.trim().to_string(),
            children,
        }
    }

    /// Children grouped by element name, in order of first appearance.
    fn grouped_children(&self) -> Vec<(&str, Vec<&XmlElement>)> {
        let mut groups: Vec<(&str, Vec<&XmlElement>)> = Vec::new();
        for child in &self.children {
            match groups.iter_mut().find(|(name, _)| *name == child.name) {
                Some((_, members)) => members.push(child),
                None => groups.push((child.name.as_str(), vec![child])),
            }
        }
        groups
    }
}

/// Parse a document into its root element.
pub(crate) fn parse_xml(bytes: &[u8]) -> Result<XmlElement, String> {
    let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    let package = parser::parse(text).map_err(|e| format!("{e:?}"))?;
    let document = package.as_document();
    document
        .root()
        .children()
        .into_iter()
        .find_map(|child| match child {
            ChildOfRoot::Element(element) => Some(XmlElement::from_dom(element)),
            _ => None,
        })
        .ok_or_else(|| "document has no root element".to_string())
}

pub(crate) fn match_xml(rules: &MatchingRules, expected: &[u8], actual: &[u8]) -> Vec<Mismatch> {
    let expected_root = match parse_xml(expected) {
        Ok(root) => root,
        Err(e) => return vec![parse_failure("expected", &e, expected)],
    };
    let actual_root = match parse_xml(actual) {
        Ok(root) => root,
        Err(e) => return vec![parse_failure("actual", &e, actual)],
    };

    let mut mismatches = Vec::new();
    if expected_root.name != actual_root.name {
        mismatches.push(Mismatch::new(
            MismatchKind::Body,
            "$",
            expected_root.name.as_str(),
            actual_root.name.as_str(),
            format!(
                "Expected root element <{}> but received <{}>",
                expected_root.name, actual_root.name
            ),
        ));
        return mismatches;
    }

    let path = DocPath::root().join(expected_root.name.clone());
    compare_elements(rules, &path, &expected_root, &actual_root, &mut mismatches);
    mismatches
}

fn parse_failure(which: &str, error: &str, bytes: &[u8]) -> Mismatch {
    let text = Value::String(String::from_utf8_lossy(bytes).into_owned());
    let (expected, actual) = if which == "expected" {
        (text, Value::Null)
    } else {
        (Value::Null, text)
    };
    Mismatch::new(
        MismatchKind::Body,
        "$",
        expected,
        actual,
        format!("Failed to parse the {which} body as XML: {error}"),
    )
}

fn compare_elements(
    rules: &MatchingRules,
    path: &DocPath,
    expected: &XmlElement,
    actual: &XmlElement,
    mismatches: &mut Vec<Mismatch>,
) {
    let type_only = rules
        .resolve(Category::Body, path)
        .is_some_and(|r| r.has_type());

    for (name, expected_value) in &expected.attributes {
        let attr_path = path.join(format!("@{name}"));
        match actual.attributes.get(name) {
            Some(actual_value) => compare_leaf(
                rules,
                &attr_path,
                &Value::String(expected_value.clone()),
                &Value::String(actual_value.clone()),
                mismatches,
            ),
            None => mismatches.push(Mismatch::new(
                MismatchKind::Body,
                attr_path.to_string(),
                expected_value.as_str(),
                Value::Null,
                format!("Expected attribute '{name}' but was missing"),
            )),
        }
    }
    if !type_only {
        for (name, actual_value) in &actual.attributes {
            if !expected.attributes.contains_key(name) {
                mismatches.push(Mismatch::new(
                    MismatchKind::Body,
                    path.join(format!("@{name}")).to_string(),
                    Value::Null,
                    actual_value.as_str(),
                    format!("Unexpected attribute '{name}'"),
                ));
            }
        }
    }

    if !expected.text.is_empty() || (!type_only && !actual.text.is_empty()) {
        compare_leaf(
            rules,
            &path.join("#text"),
            &Value::String(expected.text.clone()),
            &Value::String(actual.text.clone()),
            mismatches,
        );
    }

    let actual_groups = actual.grouped_children();
    for (name, expected_members) in expected.grouped_children() {
        let group_path = path.join(name);
        let actual_members = actual_groups
            .iter()
            .find(|(actual_name, _)| *actual_name == name)
            .map(|(_, members)| members.as_slice())
            .unwrap_or_default();
        compare_children(rules, &group_path, &expected_members, actual_members, mismatches);
    }
    if !type_only {
        for (name, members) in &actual_groups {
            if !expected.children.iter().any(|child| child.name == *name) {
                mismatches.push(Mismatch::new(
                    MismatchKind::Body,
                    path.join(*name).to_string(),
                    Value::Null,
                    Value::from(members.len()),
                    format!("Unexpected child element <{name}>"),
                ));
            }
        }
    }
}

fn compare_children(
    rules: &MatchingRules,
    group_path: &DocPath,
    expected: &[&XmlElement],
    actual: &[&XmlElement],
    mismatches: &mut Vec<Mismatch>,
) {
    let count_mismatch = |description: String| {
        Mismatch::new(
            MismatchKind::Body,
            group_path.to_string(),
            Value::from(expected.len()),
            Value::from(actual.len()),
            description,
        )
    };

    if actual.is_empty() {
        let allowed_empty = rules
            .resolve(Category::Body, group_path)
            .and_then(|r| r.min_max())
            .is_some_and(|(min, _)| min.unwrap_or(0) == 0);
        if !allowed_empty {
            mismatches.push(count_mismatch(format!(
                "Expected child element <{}> but was missing",
                expected[0].name
            )));
        }
        return;
    }

    match rules.resolve(Category::Body, group_path) {
        Some(resolved) if resolved.has_type() => {
            if let Some((min, max)) = resolved.min_max() {
                if let Err(description) = check_bounds(actual.len(), min, max) {
                    mismatches.push(count_mismatch(description));
                }
            }
            for (index, actual_child) in actual.iter().enumerate() {
                let template = expected.get(index).unwrap_or(&expected[0]);
                compare_elements(rules, &group_path.join_index(index), template, actual_child, mismatches);
            }
        }
        _ => {
            if expected.len() != actual.len() {
                mismatches.push(count_mismatch(format!(
                    "Expected {} <{}> element(s) but received {}",
                    expected.len(),
                    expected[0].name,
                    actual.len()
                )));
            }
            for (index, (expected_child, actual_child)) in expected.iter().zip(actual).enumerate() {
                compare_elements(rules, &group_path.join_index(index), expected_child, actual_child, mismatches);
            }
        }
    }
}
