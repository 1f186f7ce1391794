//! In-memory contract model.
//!
//! Pure data: parsing validates structure and normalises a few fields
//! (method case, query decomposition), but performs no matching.

pub mod body;
pub mod builder;
pub mod contract;
pub mod http;
pub mod path;
pub mod query;
pub mod rules;

pub use body::{BodyKind, ContentType, OptionalBody};
pub use builder::HttpPartBuilder;
pub use contract::{Contract, Interaction, Metadata, Party};
pub use http::{Headers, HttpPart, Request, Response};
pub use path::{DocPath, PathToken};
pub use query::{parse_query_string, query_to_string, QueryMap};
pub use rules::{Category, MatchingRule, MatchingRules, RegexRule, RuleList, RuleLogic};
