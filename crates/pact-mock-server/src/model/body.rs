//! Request and response bodies and their content types.

use base64::Engine;
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Which comparison algorithm a body is subject to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Json,
    Xml,
    Text,
    Binary,
}

/// A MIME content type, e.g. `application/json; charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    raw: String,
    essence: String,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let raw = value.trim().to_string();
        let essence = raw
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        ContentType { raw, essence }
    }

    pub fn json() -> Self {
        ContentType::parse("application/json")
    }

    pub fn xml() -> Self {
        ContentType::parse("application/xml")
    }

    pub fn text() -> Self {
        ContentType::parse("text/plain")
    }

    pub fn binary() -> Self {
        ContentType::parse("application/octet-stream")
    }

    /// Type and subtype without parameters, lowercased.
    pub fn essence(&self) -> &str {
        &self.essence
    }

    pub fn kind(&self) -> BodyKind {
        let essence = self.essence.as_str();
        if essence == "application/json" || essence == "text/json" || essence.ends_with("+json") {
            BodyKind::Json
        } else if essence == "application/xml" || essence == "text/xml" || essence.ends_with("+xml")
        {
            BodyKind::Xml
        } else if essence.starts_with("text/")
            || essence == "application/x-www-form-urlencoded"
            || essence == "application/javascript"
        {
            BodyKind::Text
        } else {
            BodyKind::Binary
        }
    }

    /// Guess a content type from the bytes themselves.
    pub fn sniff(bytes: &[u8]) -> Self {
        let Ok(text) = std::str::from_utf8(bytes) else {
            return ContentType::binary();
        };
        let trimmed = text.trim_start();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<Value>(text).is_ok()
        {
            ContentType::json()
        } else if trimmed.starts_with('<') {
            ContentType::xml()
        } else {
            ContentType::text()
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A body that may be missing, explicitly empty, or present.
///
/// `Absent` means there is no expectation at all; `Empty` means the body must
/// be empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionalBody {
    #[default]
    Absent,
    Empty,
    Present(Vec<u8>, ContentType),
}

impl OptionalBody {
    /// Build a body as declared in a contract.
    ///
    /// Missing or `null` is `Absent`, `""` is `Empty`, other strings are taken
    /// verbatim and any other JSON value is serialized as JSON.
    pub fn from_contract(value: Option<&Value>, content_type: Option<&str>) -> Self {
        match value {
            None | Some(Value::Null) => OptionalBody::Absent,
            Some(Value::String(s)) if s.is_empty() => OptionalBody::Empty,
            Some(Value::String(s)) => {
                let content_type = content_type
                    .map(ContentType::parse)
                    .unwrap_or_else(|| ContentType::sniff(s.as_bytes()));
                OptionalBody::Present(s.clone().into_bytes(), content_type)
            }
            Some(other) => OptionalBody::Present(
                other.to_string().into_bytes(),
                content_type
                    .map(ContentType::parse)
                    .unwrap_or_else(ContentType::json),
            ),
        }
    }

    /// Build a body as received on the wire.
    pub fn from_bytes(bytes: Vec<u8>, content_type: Option<&str>) -> Self {
        if bytes.is_empty() {
            return OptionalBody::Empty;
        }
        let content_type = content_type
            .map(ContentType::parse)
            .unwrap_or_else(|| ContentType::sniff(&bytes));
        OptionalBody::Present(bytes, content_type)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, OptionalBody::Present(..))
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            OptionalBody::Present(bytes, _) => bytes,
            _ => &[],
        }
    }

    pub fn content_type(&self) -> Option<&ContentType> {
        match self {
            OptionalBody::Present(_, content_type) => Some(content_type),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.bytes())
    }

    /// A JSON rendering for diagnostics: parsed JSON, text, or base64 for
    /// binary content.
    pub fn to_json_value(&self) -> Value {
        match self {
            OptionalBody::Absent => Value::Null,
            OptionalBody::Empty => Value::String(String::new()),
            OptionalBody::Present(bytes, content_type) => match content_type.kind() {
                BodyKind::Json => serde_json::from_slice(bytes)
                    .unwrap_or_else(|_| Value::String(self.as_text().into_owned())),
                BodyKind::Binary if std::str::from_utf8(bytes).is_err() => {
                    Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
                }
                _ => Value::String(self.as_text().into_owned()),
            },
        }
    }
}

impl fmt::Display for OptionalBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionalBody::Absent => write!(f, "<absent>"),
            OptionalBody::Empty => write!(f, "<empty>"),
            OptionalBody::Present(bytes, content_type) => {
                write!(f, "{} ({} bytes, {})", self.as_text(), bytes.len(), content_type)
            }
        }
    }
}
