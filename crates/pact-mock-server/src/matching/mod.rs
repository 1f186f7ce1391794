//! Rule-based request and response matching.
//!
//! Every function here is pure: it compares an expectation with an observed
//! value and returns the mismatches found. Facets are compared independently
//! and their mismatches concatenated in a fixed order.
//!
//! # Module Structure
//!
//! - `mismatch` - structured mismatch records
//! - `matchers` - evaluation of single rules and rule lists
//! - `headers` - case-insensitive header comparison
//! - `query` - key-based query comparison
//! - `body` - dispatch on body content kind
//! - `json` / `xml` - recursive structural diffs

mod body;
mod headers;
mod json;
mod matchers;
mod mismatch;
mod query;
mod xml;


pub use body::match_body;
pub use headers::match_headers;
pub use mismatch::{Mismatch, MismatchKind};
pub use query::match_query;

use crate::model::{Category, Contract, DocPath, Request, Response};
use matchers::apply_rules;
use serde_json::Value;
use tracing::trace;

pub fn match_method(expected: &str, actual: &str) -> Vec<Mismatch> {
    if expected.eq_ignore_ascii_case(actual) {
        Vec::new()
    } else {
        vec![Mismatch::new(
            MismatchKind::Method,
            "$",
            expected.to_ascii_uppercase(),
            actual.to_ascii_uppercase(),
            format!(
                "Expected method {} but received {}",
                expected.to_ascii_uppercase(),
                actual.to_ascii_uppercase()
            ),
        )]
    }
}

pub fn match_path(expected: &Request, actual: &str) -> Vec<Mismatch> {
    let expected_value = Value::String(expected.path.clone());
    let actual_value = Value::String(actual.to_string());
    let outcome = match expected
        .matching_rules
        .resolve(Category::Path, &DocPath::root())
    {
        Some(resolved) => apply_rules(&resolved, &expected_value, &actual_value),
        None if expected.path == actual => Ok(()),
        None => Err(vec![format!(
            "Expected path '{}' but received '{}'",
            expected.path, actual
        )]),
    };
    match outcome {
        Ok(()) => Vec::new(),
        Err(descriptions) => vec![Mismatch::new(
            MismatchKind::Path,
            "$",
            expected_value,
            actual_value,
            descriptions.join("; "),
        )],
    }
}

pub fn match_status(expected: &Response, actual: u16) -> Vec<Mismatch> {
    let expected_value = Value::from(expected.status);
    let actual_value = Value::from(actual);
    let outcome = match expected
        .matching_rules
        .resolve(Category::Status, &DocPath::root())
    {
        Some(resolved) => apply_rules(&resolved, &expected_value, &actual_value),
        None if expected.status == actual => Ok(()),
        None => Err(vec![format!(
            "Expected status {} but received {}",
            expected.status, actual
        )]),
    };
    match outcome {
        Ok(()) => Vec::new(),
        Err(descriptions) => vec![Mismatch::new(
            MismatchKind::Status,
            "$",
            expected_value,
            actual_value,
            descriptions.join("; "),
        )],
    }
}

/// Per-facet results for a request: method, path, query, headers, body.
fn request_facets(expected: &Request, actual: &Request) -> [Vec<Mismatch>; 5] {
    [
        match_method(&expected.method, &actual.method),
        match_path(expected, &actual.path),
        match_query(
            &expected.matching_rules,
            expected.query.as_ref(),
            actual.query.as_ref(),
        ),
        match_headers(expected, actual),
        match_body(expected, actual),
    ]
}

/// Compare an actual request with an expected one. Empty means a match.
pub fn match_request(expected: &Request, actual: &Request) -> Vec<Mismatch> {
    request_facets(expected, actual).into_iter().flatten().collect()
}

/// Compare an actual response with an expected one: status, headers, body.
pub fn match_response(expected: &Response, actual: &Response) -> Vec<Mismatch> {
    let mut mismatches = match_status(expected, actual.status);
    mismatches.extend(match_headers(expected, actual));
    mismatches.extend(match_body(expected, actual));
    mismatches
}

/// Which interaction answers a request.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// First interaction, in contract order, with no mismatches
    Matched(usize),
    /// No full match; the closest interaction and how it differed
    Mismatched {
        index: usize,
        mismatches: Vec<Mismatch>,
    },
    /// The contract has no interactions
    NotFound,
}

/// Match `actual` against every interaction.
///
/// The closest partial match is the one with the most fully matching
/// facets, then the fewest mismatches; ties go to the earliest declared.
pub fn select_interaction(contract: &Contract, actual: &Request) -> Selection {
    let mut best: Option<(usize, usize, usize, Vec<Mismatch>)> = None;

    for (index, interaction) in contract.interactions.iter().enumerate() {
        let facets = request_facets(&interaction.request, actual);
        let matching_facets = facets.iter().filter(|f| f.is_empty()).count();
        let mismatches: Vec<Mismatch> = facets.into_iter().flatten().collect();
        trace!(
            "Interaction {} '{}': {} mismatch(es)",
            index,
            interaction.description,
            mismatches.len()
        );
        if mismatches.is_empty() {
            return Selection::Matched(index);
        }

        let better = best.as_ref().map_or(true, |(_, facets, count, _)| {
            matching_facets > *facets || (matching_facets == *facets && mismatches.len() < *count)
        });
        if better {
            best = Some((index, matching_facets, mismatches.len(), mismatches));
        }
    }

    match best {
        Some((index, _, _, mismatches)) => Selection::Mismatched { index, mismatches },
        None => Selection::NotFound,
    }
}
