//! Matching rules: per-path directives that relax or redirect equality.
//!
//! Contracts carry rules in one of two encodings, both accepted here:
//!
//! - flat, keyed by full path: `{"$.body.id": {"match": "type"}}`
//! - categorised: `{"body": {"$.id": {"combine": "AND", "matchers": [...]}}}`
//!
//! Regexes are compiled once at parse time.

use super::path::{DocPath, PathToken};
use crate::error::ContractError;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A compiled regex rule, matched against the whole value.
#[derive(Debug, Clone)]
pub struct RegexRule {
    pattern: String,
    anchored: Arc<Regex>,
}

impl RegexRule {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let anchored = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(RegexRule {
            pattern: pattern.to_string(),
            anchored: Arc::new(anchored),
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.anchored.is_match(value)
    }
}

impl PartialEq for RegexRule {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

/// One matching directive.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchingRule {
    /// Exact equality (the default when no rule applies)
    Equality,
    /// Same structural type, value ignored
    Type,
    /// Whole-value regex match on the value's string form
    Regex(RegexRule),
    /// String form contains the given substring
    Include(String),
    /// Array cardinality bounds; implies type matching of the elements
    MinMax {
        min: Option<usize>,
        max: Option<usize>,
    },
}

impl MatchingRule {
    /// Whether the rule, declared on a container, also governs its descendants.
    pub fn cascades(&self) -> bool {
        matches!(self, MatchingRule::Type | MatchingRule::MinMax { .. })
    }

    /// Parse one matcher definition, e.g. `{"match": "regex", "regex": "\\d+"}`.
    pub fn from_json(location: &str, value: &Value) -> Result<Self, ContractError> {
        let definition = value
            .as_object()
            .ok_or_else(|| ContractError::invalid(location, "matcher must be a JSON object"))?;

        let bound = |key: &str| -> Result<Option<usize>, ContractError> {
            match definition.get(key) {
                None | Some(Value::Null) => Ok(None),
                Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
                    ContractError::invalid(location, format!("'{key}' must be a non-negative integer"))
                }),
            }
        };
        let min = bound("min")?;
        let max = bound("max")?;

        let regex = || -> Result<MatchingRule, ContractError> {
            let pattern = definition
                .get("regex")
                .and_then(Value::as_str)
                .ok_or_else(|| ContractError::invalid(location, "regex matcher needs a 'regex' string"))?;
            RegexRule::new(pattern)
                .map(MatchingRule::Regex)
                .map_err(|e| ContractError::invalid(location, format!("invalid regex: {e}")))
        };

        match definition.get("match").and_then(Value::as_str) {
            Some("equality") => Ok(MatchingRule::Equality),
            Some("type") | Some("min") | Some("max") if min.is_some() || max.is_some() => {
                Ok(MatchingRule::MinMax { min, max })
            }
            Some("type") => Ok(MatchingRule::Type),
            Some("regex") => regex(),
            Some("include") => definition
                .get("value")
                .and_then(Value::as_str)
                .map(|s| MatchingRule::Include(s.to_string()))
                .ok_or_else(|| {
                    ContractError::invalid(location, "include matcher needs a 'value' string")
                }),
            Some(other) => Err(ContractError::invalid(
                location,
                format!("unknown matcher '{other}'"),
            )),
            None if definition.contains_key("regex") => regex(),
            None if min.is_some() || max.is_some() => Ok(MatchingRule::MinMax { min, max }),
            None => Err(ContractError::invalid(location, "matcher has no 'match' type")),
        }
    }
}

impl MatchingRule {
    /// The matcher definition as written to a pact file.
    pub fn to_json(&self) -> Value {
        match self {
            MatchingRule::Equality => json!({"match": "equality"}),
            MatchingRule::Type => json!({"match": "type"}),
            MatchingRule::Regex(regex) => json!({"match": "regex", "regex": regex.pattern()}),
            MatchingRule::Include(value) => json!({"match": "include", "value": value}),
            MatchingRule::MinMax { min, max } => {
                let mut definition = Map::new();
                definition.insert("match".to_string(), json!("type"));
                if let Some(min) = min {
                    definition.insert("min".to_string(), json!(min));
                }
                if let Some(max) = max {
                    definition.insert("max".to_string(), json!(max));
                }
                Value::Object(definition)
            }
        }
    }
}

impl fmt::Display for MatchingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchingRule::Equality => write!(f, "equality"),
            MatchingRule::Type => write!(f, "type"),
            MatchingRule::Regex(regex) => write!(f, "regex /{}/", regex.pattern()),
            MatchingRule::Include(value) => write!(f, "include '{value}'"),
            MatchingRule::MinMax { min, max } => {
                write!(f, "type")?;
                if let Some(min) = min {
                    write!(f, " min={min}")?;
                }
                if let Some(max) = max {
                    write!(f, " max={max}")?;
                }
                Ok(())
            }
        }
    }
}

/// How the rules of a [`RuleList`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuleLogic {
    #[default]
    And,
    Or,
}

/// The rules registered at one path.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleList {
    pub rules: Vec<MatchingRule>,
    pub logic: RuleLogic,
}

impl RuleList {
    pub fn new(rule: MatchingRule) -> Self {
        RuleList {
            rules: vec![rule],
            logic: RuleLogic::And,
        }
    }

    fn has_cascading(&self) -> bool {
        self.rules.iter().any(MatchingRule::cascades)
    }

    pub fn to_json(&self) -> Value {
        let combine = match self.logic {
            RuleLogic::And => "AND",
            RuleLogic::Or => "OR",
        };
        json!({
            "combine": combine,
            "matchers": self.rules.iter().map(MatchingRule::to_json).collect::<Vec<_>>(),
        })
    }

    /// Parse either a single matcher or `{"combine": ..., "matchers": [...]}`.
    pub fn from_json(location: &str, value: &Value) -> Result<Self, ContractError> {
        let Some(matchers) = value.get("matchers") else {
            return Ok(RuleList::new(MatchingRule::from_json(location, value)?));
        };
        let matchers = matchers
            .as_array()
            .ok_or_else(|| ContractError::invalid(location, "'matchers' must be an array"))?;
        let logic = match value.get("combine").and_then(Value::as_str) {
            None => RuleLogic::And,
            Some(c) if c.eq_ignore_ascii_case("and") => RuleLogic::And,
            Some(c) if c.eq_ignore_ascii_case("or") => RuleLogic::Or,
            Some(other) => {
                return Err(ContractError::invalid(
                    location,
                    format!("unknown combine logic '{other}'"),
                ))
            }
        };
        let rules = matchers
            .iter()
            .enumerate()
            .map(|(i, m)| MatchingRule::from_json(&format!("{location}.matchers[{i}]"), m))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuleList { rules, logic })
    }
}

/// Which facet of a request or response a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Path,
    Query,
    Header,
    Body,
    Status,
}

impl Category {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "path" => Some(Category::Path),
            "query" => Some(Category::Query),
            "header" | "headers" => Some(Category::Header),
            "body" => Some(Category::Body),
            "status" => Some(Category::Status),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Category::Path => "path",
            Category::Query => "query",
            Category::Header => "header",
            Category::Body => "body",
            Category::Status => "status",
        }
    }
}

/// The outcome of looking up the rules for a concrete path.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRules<'a> {
    list: &'a RuleList,
    /// Declared on an ancestor rather than on the path itself
    pub inherited: bool,
}

impl<'a> ResolvedRules<'a> {
    /// Rules in force at this path; inherited lists contribute only their
    /// cascading rules.
    pub fn rules(&self) -> impl Iterator<Item = &'a MatchingRule> {
        let inherited = self.inherited;
        self.list
            .rules
            .iter()
            .filter(move |rule| !inherited || rule.cascades())
    }

    pub fn logic(&self) -> RuleLogic {
        self.list.logic
    }

    pub fn min_max(&self) -> Option<(Option<usize>, Option<usize>)> {
        self.rules().find_map(|rule| match rule {
            MatchingRule::MinMax { min, max } => Some((*min, *max)),
            _ => None,
        })
    }

    pub fn has_type(&self) -> bool {
        self.rules().any(MatchingRule::cascades)
    }
}

/// All matching rules of one request or response, by category and path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchingRules {
    categories: BTreeMap<Category, Vec<(DocPath, RuleList)>>,
}

impl MatchingRules {
    pub fn new() -> Self {
        MatchingRules::default()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.values().all(Vec::is_empty)
    }

    /// Register `rule` at `path`, appending to any list already there.
    pub fn add_rule(&mut self, category: Category, path: DocPath, rule: MatchingRule) -> &mut Self {
        let entries = self.categories.entry(category).or_default();
        match entries.iter_mut().find(|(p, _)| *p == path) {
            Some((_, list)) => list.rules.push(rule),
            None => entries.push((path, RuleList::new(rule))),
        }
        self
    }

    pub fn add_rules(&mut self, category: Category, path: DocPath, list: RuleList) -> &mut Self {
        let entries = self.categories.entry(category).or_default();
        match entries.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => existing.rules.extend(list.rules),
            None => entries.push((path, list)),
        }
        self
    }

    pub fn rules_for(&self, category: Category) -> &[(DocPath, RuleList)] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rules for a named header or query parameter (`$.<name>`).
    pub fn resolve_named(&self, category: Category, name: &str) -> Option<ResolvedRules<'_>> {
        let name = if category == Category::Header {
            name.to_ascii_lowercase()
        } else {
            name.to_string()
        };
        self.resolve(category, &DocPath::root().join(name))
    }

    /// Find the rules governing `path`.
    ///
    /// Candidates are expressions matching the whole path, or a prefix of it
    /// when they carry cascading rules. The longest expression wins, then the
    /// heaviest (exact steps beat wildcards), then the earliest declared.
    pub fn resolve(&self, category: Category, path: &DocPath) -> Option<ResolvedRules<'_>> {
        let mut best: Option<((usize, usize), ResolvedRules<'_>)> = None;
        for (expression, list) in self.rules_for(category) {
            let Some(weight) = expression.weight_against(path) else {
                continue;
            };
            let inherited = expression.len() < path.len();
            if inherited && !list.has_cascading() {
                continue;
            }
            let rank = (expression.len(), weight);
            if best.as_ref().map_or(true, |(current, _)| rank > *current) {
                best = Some((rank, ResolvedRules { list, inherited }));
            }
        }
        best.map(|(_, resolved)| resolved)
    }

    /// The categorised encoding, as written to pact files.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for (category, entries) in &self.categories {
            let Some((_, first)) = entries.first() else {
                continue;
            };
            let value = match category {
                Category::Path | Category::Status => first.to_json(),
                Category::Query | Category::Header => entries
                    .iter()
                    .map(|(path, list)| (named_key(path), list.to_json()))
                    .collect::<Map<_, _>>()
                    .into(),
                Category::Body => entries
                    .iter()
                    .map(|(path, list)| (path.to_string(), list.to_json()))
                    .collect::<Map<_, _>>()
                    .into(),
            };
            object.insert(category.name().to_string(), value);
        }
        Value::Object(object)
    }

    /// Parse the `matchingRules` object of a request or response.
    pub fn from_json(location: &str, value: &Value) -> Result<Self, ContractError> {
        let mut rules = MatchingRules::new();
        let object = match value {
            Value::Null => return Ok(rules),
            Value::Object(object) => object,
            _ => return Err(ContractError::invalid(location, "expected a JSON object")),
        };

        if object.keys().any(|key| key.starts_with('$')) {
            rules.parse_flat(location, object)?;
        } else {
            rules.parse_categorised(location, object)?;
        }
        Ok(rules)
    }

    fn parse_flat(&mut self, location: &str, object: &Map<String, Value>) -> Result<(), ContractError> {
        for (key, definition) in object {
            let rule_location = format!("{location}['{key}']");
            let path = match DocPath::parse(key) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Ignoring matching rule at {}: {}", rule_location, e);
                    continue;
                }
            };
            let list = RuleList::from_json(&rule_location, definition)?;

            let category = match path.tokens().get(1) {
                Some(PathToken::Field(name)) => Category::from_name(name),
                _ => None,
            };
            let name = match path.tokens().get(2) {
                Some(PathToken::Field(name)) => Some(name.clone()),
                _ => None,
            };
            match (category, name) {
                (Some(Category::Path), _) => {
                    self.add_rules(Category::Path, DocPath::root(), list);
                }
                (Some(Category::Status), _) => {
                    self.add_rules(Category::Status, DocPath::root(), list);
                }
                (Some(Category::Body), _) => {
                    self.add_rules(Category::Body, path.strip_first_field(), list);
                }
                (Some(Category::Header), Some(name)) => {
                    self.add_rules(
                        Category::Header,
                        DocPath::root().join(name.to_ascii_lowercase()),
                        list,
                    );
                }
                (Some(Category::Query), Some(name)) => {
                    self.add_rules(Category::Query, DocPath::root().join(name), list);
                }
                _ => warn!("Ignoring matching rule with unrecognised path {}", rule_location),
            }
        }
        Ok(())
    }

    fn parse_categorised(
        &mut self,
        location: &str,
        object: &Map<String, Value>,
    ) -> Result<(), ContractError> {
        for (name, content) in object {
            let category_location = format!("{location}.{name}");
            let Some(category) = Category::from_name(name) else {
                warn!("Ignoring unknown matching rule category {}", category_location);
                continue;
            };
            match category {
                Category::Path | Category::Status => {
                    if content.as_object().is_some_and(|o| o.is_empty()) {
                        continue;
                    }
                    let list = RuleList::from_json(&category_location, content)?;
                    self.add_rules(category, DocPath::root(), list);
                }
                Category::Query | Category::Header | Category::Body => {
                    let entries = content.as_object().ok_or_else(|| {
                        ContractError::invalid(&category_location, "expected a JSON object")
                    })?;
                    for (key, definition) in entries {
                        let rule_location = format!("{category_location}['{key}']");
                        let list = RuleList::from_json(&rule_location, definition)?;
                        let path = if category == Category::Body {
                            match DocPath::parse(key) {
                                Ok(path) => path,
                                Err(e) => {
                                    warn!("Ignoring matching rule at {}: {}", rule_location, e);
                                    continue;
                                }
                            }
                        } else if category == Category::Header {
                            DocPath::root().join(key.to_ascii_lowercase())
                        } else {
                            DocPath::root().join(key.clone())
                        };
                        self.add_rules(category, path, list);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Header and query rules live at `$.<name>`.
fn named_key(path: &DocPath) -> String {
    match path.tokens().get(1) {
        Some(PathToken::Field(name)) => name.clone(),
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_flat_rules() {
        let rules = MatchingRules::from_json(
            "request.matchingRules",
            &json!({
                "$.path": {"match": "regex", "regex": "/product/\\d+"},
                "$.headers.Date": {"regex": "\\d{4}"},
                "$.query.page": {"match": "type"},
                "$.body.items": {"min": 1},
                "$.body.items[*].id": {"match": "type"}
            }),
        )
        .unwrap();

        assert_eq!(rules.rules_for(Category::Path).len(), 1);
        assert!(rules.resolve_named(Category::Header, "DATE").is_some());
        assert!(rules.resolve_named(Category::Query, "page").is_some());
        let items = DocPath::parse("$.items").unwrap();
        assert_eq!(
            rules.resolve(Category::Body, &items).unwrap().min_max(),
            Some((Some(1), None))
        );
    }

    #[test]
    fn test_parse_categorised_rules() {
        let rules = MatchingRules::from_json(
            "request.matchingRules",
            &json!({
                "path": {"combine": "AND", "matchers": [{"match": "regex", "regex": "/a/.*"}]},
                "header": {"X-Id": {"matchers": [{"match": "type"}]}},
                "body": {"$.name": {"combine": "OR", "matchers": [
                    {"match": "include", "value": "foo"},
                    {"match": "equality"}
                ]}}
            }),
        )
        .unwrap();

        let path = rules.resolve(Category::Path, &DocPath::root()).unwrap();
        assert!(matches!(path.rules().next(), Some(MatchingRule::Regex(_))));
        assert!(rules.resolve_named(Category::Header, "x-id").is_some());
        let name = rules
            .resolve(Category::Body, &DocPath::parse("$.name").unwrap())
            .unwrap();
        assert_eq!(name.logic(), RuleLogic::Or);
        assert_eq!(name.rules().count(), 2);
    }

    #[test]
    fn test_unknown_matcher_is_an_error() {
        let err = MatchingRules::from_json(
            "interactions[0].request.matchingRules",
            &json!({"$.body.a": {"match": "telepathy"}}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("interactions[0].request.matchingRules['$.body.a']"));
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        let result = MatchingRules::from_json("rules", &json!({"$.path": {"regex": "(unclosed"}}));
        assert!(matches!(result, Err(ContractError::InvalidField { .. })));
    }

    #[test]
    fn test_malformed_rule_path_is_skipped() {
        let rules =
            MatchingRules::from_json("rules", &json!({"$.body.a[": {"match": "type"}})).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_resolution_prefers_specific_and_cascades_types_only() {
        let mut rules = MatchingRules::new();
        rules.add_rule(
            Category::Body,
            DocPath::parse("$.items").unwrap(),
            MatchingRule::MinMax { min: Some(1), max: None },
        );
        rules.add_rule(
            Category::Body,
            DocPath::parse("$.items[*].id").unwrap(),
            MatchingRule::Regex(RegexRule::new("\\d+").unwrap()),
        );
        rules.add_rule(
            Category::Body,
            DocPath::parse("$.name").unwrap(),
            MatchingRule::Include("x".into()),
        );

        let id = DocPath::parse("$.items[3].id").unwrap();
        let resolved = rules.resolve(Category::Body, &id).unwrap();
        assert!(!resolved.inherited);
        assert!(matches!(resolved.rules().next(), Some(MatchingRule::Regex(_))));

        let label = DocPath::parse("$.items[3].label").unwrap();
        let resolved = rules.resolve(Category::Body, &label).unwrap();
        assert!(resolved.inherited);
        assert!(resolved.has_type());

        let nested = DocPath::parse("$.name.first").unwrap();
        assert!(rules.resolve(Category::Body, &nested).is_none());
    }

    #[test]
    fn test_written_rules_read_back() {
        let rules = MatchingRules::from_json(
            "request.matchingRules",
            &json!({
                "$.path": {"match": "regex", "regex": "/product/\\d+"},
                "$.headers.X-Request-Id": {"match": "type"},
                "$.query.page": {"match": "include", "value": "1"},
                "$.body.items": {"min": 1, "max": 3}
            }),
        )
        .unwrap();

        let written = rules.to_json();
        assert_eq!(written["path"]["matchers"][0]["regex"], "/product/\\d+");
        assert_eq!(written["header"]["x-request-id"]["combine"], "AND");
        assert_eq!(
            written["body"]["$.items"]["matchers"][0],
            json!({"match": "type", "min": 1, "max": 3})
        );

        let reread = MatchingRules::from_json("request.matchingRules", &written).unwrap();
        assert_eq!(reread, rules);
    }

    #[test]
    fn test_regex_is_whole_value() {
        let rule = RegexRule::new("\\d+").unwrap();
        assert!(rule.is_match("123"));
        assert!(!rule.is_match("a123"));
        assert!(!rule.is_match("123a"));
    }
}
