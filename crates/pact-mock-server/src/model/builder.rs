//! Incremental construction of contracts, for callers that describe
//! interactions step by step instead of handing over contract text.

use super::body::{ContentType, OptionalBody};
use super::http::{Headers, HttpPart, Request, Response};

/// Set `values[index]`, padding with empty strings as needed.
fn set_indexed(values: &mut Vec<String>, index: usize, value: String) {
    if values.len() <= index {
        values.resize(index + 1, String::new());
    }
    values[index] = value;
}

/// Mutators shared by [`Request`] and [`Response`].
pub trait HttpPartBuilder: HttpPart {
    fn headers_mut(&mut self) -> &mut Option<Headers>;
    fn body_mut(&mut self) -> &mut OptionalBody;

    /// Set one value of a header. Names are matched case-insensitively
    /// against headers already present.
    fn with_header(&mut self, name: &str, index: usize, value: impl Into<String>) -> &mut Self {
        let headers = self.headers_mut().get_or_insert_with(Headers::new);
        let key = headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        set_indexed(headers.entry(key).or_default(), index, value.into());
        self
    }

    /// Set the body. An explicit `Content-Type` header wins over
    /// `content_type`, which itself defaults to `text/plain`.
    fn with_body(&mut self, content_type: Option<&str>, body: &str) -> &mut Self {
        if body.is_empty() {
            *self.body_mut() = OptionalBody::Empty;
            return self;
        }
        let declared = self.content_type_header().map(ContentType::parse);
        let content_type = match declared {
            Some(declared) => declared,
            None => {
                let content_type = content_type
                    .map(ContentType::parse)
                    .unwrap_or_else(ContentType::text);
                self.with_header("Content-Type", 0, content_type.to_string());
                content_type
            }
        };
        *self.body_mut() = OptionalBody::Present(body.as_bytes().to_vec(), content_type);
        self
    }
}

impl HttpPartBuilder for Request {
    fn headers_mut(&mut self) -> &mut Option<Headers> {
        &mut self.headers
    }

    fn body_mut(&mut self) -> &mut OptionalBody {
        &mut self.body
    }
}

impl HttpPartBuilder for Response {
    fn headers_mut(&mut self) -> &mut Option<Headers> {
        &mut self.headers
    }

    fn body_mut(&mut self) -> &mut OptionalBody {
        &mut self.body
    }
}

impl Request {
    pub fn with_method_and_path(&mut self, method: &str, path: &str) -> &mut Self {
        self.method = method.to_ascii_uppercase();
        self.path = path.to_string();
        self
    }

    pub fn with_query_parameter(
        &mut self,
        name: &str,
        index: usize,
        value: impl Into<String>,
    ) -> &mut Self {
        let query = self.query.get_or_insert_with(Default::default);
        set_indexed(query.entry(name.to_string()).or_default(), index, value.into());
        self
    }
}

impl Response {
    pub fn with_status(&mut self, status: u16) -> &mut Self {
        self.status = status;
        self
    }
}
