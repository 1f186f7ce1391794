//! Building hyper responses.

use crate::matching::Mismatch;
use crate::model::{HttpPart, Response as ContractResponse};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use tracing::error;

/// Header marking responses produced for unmatched requests.
pub const MISMATCH_HEADER: &str = "x-pact-mismatch";

/// Build an HTTP response with headers.
///
/// Falls back to a bare 500 if the builder rejects a header or status.
pub fn build_response_with_headers(
    status: StatusCode,
    headers: impl IntoIterator<Item = (impl AsRef<str>, impl AsRef<str>)>,
    body: impl Into<Bytes>,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(status);
    for (key, value) in headers {
        builder = builder.header(key.as_ref(), value.as_ref());
    }
    builder.body(Full::new(body.into())).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        let mut response = Response::new(Full::new(Bytes::from("Internal Server Error")));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// The response declared by a matched interaction.
pub fn contract_response(expected: &ContractResponse) -> Response<Full<Bytes>> {
    let status = match StatusCode::from_u16(expected.status) {
        Ok(status) => status,
        Err(_) => {
            error!("Interaction declares invalid status {}", expected.status);
            return build_response_with_headers(
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Invalid status {} in contract", expected.status),
            );
        }
    };

    let mut headers: Vec<(String, String)> = expected
        .headers
        .iter()
        .flatten()
        .flat_map(|(name, values)| values.iter().map(move |value| (name.clone(), value.clone())))
        .collect();
    if expected.content_type_header().is_none() {
        if let Some(content_type) = expected.body.content_type() {
            headers.push(("content-type".to_string(), content_type.to_string()));
        }
    }

    build_response_with_headers(status, headers, Bytes::from(expected.body.bytes().to_vec()))
}

/// The 500 sent for a request no interaction matched.
pub fn mismatch_response(error: &str, mismatches: &[Mismatch]) -> Response<Full<Bytes>> {
    let body = json!({
        "error": error,
        "mismatches": mismatches,
    });
    build_response_with_headers(
        StatusCode::INTERNAL_SERVER_ERROR,
        [(MISMATCH_HEADER, "true"), ("content-type", "application/json")],
        body.to_string(),
    )
}

/// Permissive answer to a CORS preflight.
pub fn preflight_response(
    origin: Option<&str>,
    requested_headers: Option<&str>,
) -> Response<Full<Bytes>> {
    build_response_with_headers(
        StatusCode::OK,
        [
            ("access-control-allow-origin", origin.unwrap_or("*")),
            (
                "access-control-allow-methods",
                "GET, HEAD, POST, PUT, DELETE, CONNECT, OPTIONS, TRACE, PATCH",
            ),
            (
                "access-control-allow-headers",
                requested_headers.unwrap_or("*"),
            ),
            ("access-control-allow-credentials", "true"),
        ],
        Bytes::new(),
    )
}
