//! Expected and actual HTTP requests and responses.

use super::body::OptionalBody;
use super::query::{parse_query_string, QueryMap};
use super::rules::MatchingRules;
use crate::error::ContractError;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Header name → values. Lookups through [`HttpPart::header`] ignore case.
pub type Headers = BTreeMap<String, Vec<String>>;

/// What requests and responses have in common, so header and body matching
/// can be shared between them.
pub trait HttpPart {
    fn headers(&self) -> Option<&Headers>;
    fn body(&self) -> &OptionalBody;
    fn matching_rules(&self) -> &MatchingRules;

    /// Values of the named header, case-insensitively.
    fn header(&self, name: &str) -> Option<&Vec<String>> {
        self.headers()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values)
    }

    fn content_type_header(&self) -> Option<&str> {
        self.header("content-type")
            .and_then(|values| values.first())
            .map(String::as_str)
    }
}

// ============================================================================
// Request
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub query: Option<QueryMap>,
    pub headers: Option<Headers>,
    pub body: OptionalBody,
    pub matching_rules: MatchingRules,
}

impl Default for Request {
    fn default() -> Self {
        Request {
            method: "GET".to_string(),
            path: "/".to_string(),
            query: None,
            headers: None,
            body: OptionalBody::Absent,
            matching_rules: MatchingRules::new(),
        }
    }
}

impl HttpPart for Request {
    fn headers(&self) -> Option<&Headers> {
        self.headers.as_ref()
    }

    fn body(&self) -> &OptionalBody {
        &self.body
    }

    fn matching_rules(&self) -> &MatchingRules {
        &self.matching_rules
    }
}

impl Request {
    /// Parse the `request` object of an interaction.
    pub fn from_json(location: &str, value: &Value) -> Result<Self, ContractError> {
        let object = value
            .as_object()
            .ok_or_else(|| ContractError::invalid(location, "expected a JSON object"))?;

        let method = match object.get("method") {
            None | Some(Value::Null) => "GET".to_string(),
            Some(Value::String(method)) => method.to_ascii_uppercase(),
            Some(_) => {
                return Err(ContractError::invalid(
                    format!("{location}.method"),
                    "expected a string",
                ))
            }
        };
        let path = optional_string(object, location, "path")?.unwrap_or_else(|| "/".to_string());
        let query = parse_query(object.get("query"), &format!("{location}.query"))?;
        let headers = parse_headers(object.get("headers"), &format!("{location}.headers"))?;
        let matching_rules = parse_rules(object, location)?;
        let body = parse_body(object, headers.as_ref());

        Ok(Request {
            method,
            path,
            query,
            headers,
            body,
            matching_rules,
        })
    }

    /// A JSON summary of the request for mismatch reports.
    pub fn to_json(&self) -> Value {
        let mut summary = json!({
            "method": self.method,
            "path": self.path,
        });
        if let Some(query) = &self.query {
            summary["query"] = json!(query);
        }
        if let Some(headers) = &self.headers {
            summary["headers"] = json!(headers);
        }
        if !matches!(self.body, OptionalBody::Absent) {
            summary["body"] = self.body.to_json_value();
        }
        summary
    }

    /// The request as written to a pact file.
    pub fn to_pact_json(&self) -> Value {
        let mut request = self.to_json();
        if !self.matching_rules.is_empty() {
            request["matchingRules"] = self.matching_rules.to_json();
        }
        request
    }
}

// ============================================================================
// Response
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub headers: Option<Headers>,
    pub body: OptionalBody,
    pub matching_rules: MatchingRules,
}

impl Default for Response {
    fn default() -> Self {
        Response {
            status: 200,
            headers: None,
            body: OptionalBody::Absent,
            matching_rules: MatchingRules::new(),
        }
    }
}

impl HttpPart for Response {
    fn headers(&self) -> Option<&Headers> {
        self.headers.as_ref()
    }

    fn body(&self) -> &OptionalBody {
        &self.body
    }

    fn matching_rules(&self) -> &MatchingRules {
        &self.matching_rules
    }
}

impl Response {
    /// Parse the `response` object of an interaction.
    pub fn from_json(location: &str, value: &Value) -> Result<Self, ContractError> {
        let object = value
            .as_object()
            .ok_or_else(|| ContractError::invalid(location, "expected a JSON object"))?;

        let status = match object.get("status") {
            None | Some(Value::Null) => 200,
            Some(status) => status
                .as_u64()
                .filter(|s| (100..=999).contains(s))
                .map(|s| s as u16)
                .ok_or_else(|| {
                    ContractError::invalid(
                        format!("{location}.status"),
                        "expected an HTTP status code",
                    )
                })?,
        };
        let headers = parse_headers(object.get("headers"), &format!("{location}.headers"))?;
        let matching_rules = parse_rules(object, location)?;
        let body = parse_body(object, headers.as_ref());

        Ok(Response {
            status,
            headers,
            body,
            matching_rules,
        })
    }

    /// The response as written to a pact file.
    pub fn to_pact_json(&self) -> Value {
        let mut response = json!({ "status": self.status });
        if let Some(headers) = &self.headers {
            response["headers"] = json!(headers);
        }
        if !matches!(self.body, OptionalBody::Absent) {
            response["body"] = self.body.to_json_value();
        }
        if !self.matching_rules.is_empty() {
            response["matchingRules"] = self.matching_rules.to_json();
        }
        response
    }
}

// ============================================================================
// Field parsing
// ============================================================================

fn optional_string(
    object: &Map<String, Value>,
    location: &str,
    key: &str,
) -> Result<Option<String>, ContractError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ContractError::invalid(
            format!("{location}.{key}"),
            "expected a string",
        )),
    }
}

/// A string or an array of strings.
fn string_values(value: &Value, location: &str) -> Result<Vec<String>, ContractError> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| match item {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                _ => Err(ContractError::invalid(
                    format!("{location}[{i}]"),
                    "expected a string",
                )),
            })
            .collect(),
        Value::Number(n) => Ok(vec![n.to_string()]),
        Value::Bool(b) => Ok(vec![b.to_string()]),
        _ => Err(ContractError::invalid(
            location,
            "expected a string or an array of strings",
        )),
    }
}

fn parse_query(value: Option<&Value>, location: &str) -> Result<Option<QueryMap>, ContractError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(raw)) if raw.is_empty() => Ok(None),
        Some(Value::String(raw)) => Ok(Some(parse_query_string(raw))),
        Some(Value::Object(entries)) => {
            let mut query = QueryMap::new();
            for (key, values) in entries {
                query.insert(key.clone(), string_values(values, &format!("{location}.{key}"))?);
            }
            Ok(Some(query))
        }
        Some(_) => Err(ContractError::invalid(
            location,
            "expected a query string or an object",
        )),
    }
}

fn parse_headers(value: Option<&Value>, location: &str) -> Result<Option<Headers>, ContractError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(entries)) => {
            let mut headers = Headers::new();
            for (name, values) in entries {
                headers.insert(name.clone(), string_values(values, &format!("{location}.{name}"))?);
            }
            Ok(Some(headers))
        }
        Some(_) => Err(ContractError::invalid(location, "expected a JSON object")),
    }
}

fn parse_rules(object: &Map<String, Value>, location: &str) -> Result<MatchingRules, ContractError> {
    match object.get("matchingRules") {
        None => Ok(MatchingRules::new()),
        Some(rules) => MatchingRules::from_json(&format!("{location}.matchingRules"), rules),
    }
}

fn parse_body(object: &Map<String, Value>, headers: Option<&Headers>) -> OptionalBody {
    let content_type = headers.and_then(|headers| {
        headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    });
    OptionalBody::from_contract(object.get("body"), content_type)
}
