//! Structured mismatch records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which facet of a request or response failed to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MismatchKind {
    #[serde(rename = "MethodMismatch")]
    Method,
    #[serde(rename = "PathMismatch")]
    Path,
    #[serde(rename = "QueryMismatch")]
    Query,
    #[serde(rename = "HeaderMismatch")]
    Header,
    #[serde(rename = "BodyMismatch")]
    Body,
    #[serde(rename = "BodyTypeMismatch")]
    BodyType,
    #[serde(rename = "StatusMismatch")]
    Status,
}

/// One expectation that an actual value failed to satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mismatch {
    #[serde(rename = "type")]
    pub kind: MismatchKind,
    /// Header name, query key, or structural body path (`$.items[0].id`)
    pub path: String,
    pub expected: Value,
    pub actual: Value,
    pub description: String,
}

impl Mismatch {
    pub fn new(
        kind: MismatchKind,
        path: impl Into<String>,
        expected: impl Into<Value>,
        actual: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        Mismatch {
            kind,
            path: path.into(),
            expected: expected.into(),
            actual: actual.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} at {}: {}", self.kind, self.path, self.description)
    }
}
