//! Request handling logic for mock servers.

use super::core::MockServer;
use super::response::{contract_response, mismatch_response, preflight_response};
use super::types::MatchOutcome;
use crate::matching::{select_interaction, Selection};
use crate::model::{parse_query_string, Headers, HttpPart, OptionalBody, Request as ContractRequest};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Convert a received request into the contract model.
pub(crate) fn to_contract_request(parts: &Parts, body: Bytes) -> ContractRequest {
    let raw_path = parts.uri.path();
    let path = urlencoding::decode(raw_path)
        .map(|p| p.into_owned())
        .unwrap_or_else(|_| raw_path.to_string());
    let query = parts
        .uri
        .query()
        .filter(|q| !q.is_empty())
        .map(parse_query_string);

    let mut headers = Headers::new();
    for (name, value) in &parts.headers {
        headers
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    let content_type = headers
        .get("content-type")
        .and_then(|values| values.first())
        .cloned();

    ContractRequest {
        method: parts.method.as_str().to_ascii_uppercase(),
        path,
        query,
        headers: if headers.is_empty() { None } else { Some(headers) },
        body: OptionalBody::from_bytes(body.to_vec(), content_type.as_deref()),
        ..ContractRequest::default()
    }
}

/// Handle a request to a mock server
pub async fn handle_request(
    req: Request<Incoming>,
    server: Arc<MockServer>,
    client_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body from {}: {}", client_addr, e);
            Bytes::new()
        }
    };

    let request = to_contract_request(&parts, body);
    debug!(
        "Mock server on port {} received {} {} from {}",
        server.port(),
        request.method,
        request.path,
        client_addr
    );
    server.count_request(&request.path);

    match select_interaction(server.contract(), &request) {
        Selection::Matched(index) => {
            let interaction = &server.contract().interactions[index];
            debug!(
                "Request {} {} matched interaction '{}'",
                request.method, request.path, interaction.description
            );
            let response = contract_response(&interaction.response);
            server.record(client_addr, request, MatchOutcome::Matched(index));
            Ok(response)
        }
        Selection::Mismatched { index, mismatches } => {
            if let Some(response) = preflight(&server, &parts) {
                return Ok(response);
            }
            warn!(
                "Request {} {} did not match; closest interaction was '{}' with {} mismatch(es)",
                request.method,
                request.path,
                server.contract().interactions[index].description,
                mismatches.len()
            );
            let error = format!("Request-Mismatch : {} {}", request.method, request.path);
            let response = mismatch_response(&error, &mismatches);
            server.record(
                client_addr,
                request,
                MatchOutcome::Mismatched { index, mismatches },
            );
            Ok(response)
        }
        Selection::NotFound => {
            if let Some(response) = preflight(&server, &parts) {
                return Ok(response);
            }
            warn!(
                "Unexpected request {} {}: the contract declares no interactions",
                request.method, request.path
            );
            let error = format!("Unexpected-Request : {} {}", request.method, request.path);
            let response = mismatch_response(&error, &[]);
            server.record(client_addr, request, MatchOutcome::NotFound);
            Ok(response)
        }
    }
}

/// Answer an unmatched `OPTIONS` request as a CORS preflight, if enabled.
fn preflight(server: &MockServer, parts: &Parts) -> Option<Response<Full<Bytes>>> {
    if !server.config().cors_preflight || parts.method != Method::OPTIONS {
        return None;
    }
    let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
    debug!("Answering CORS preflight for {}", parts.uri.path());
    Some(preflight_response(
        header("origin"),
        header("access-control-request-headers"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BodyKind;

    #[test]
    fn test_to_contract_request() {
        let (parts, _) = Request::builder()
            .method("post")
            .uri("/mallory%20path?name=ron&status=good")
            .header("Content-Type", "application/json")
            .header("X-Many", "a")
            .header("X-Many", "b")
            .body(())
            .unwrap()
            .into_parts();
        let request = to_contract_request(&parts, Bytes::from_static(b"{\"a\":1}"));

        assert_eq!(request.method, "POST");
        assert_eq!(request.path, "/mallory path");
        assert_eq!(request.query.as_ref().unwrap()["name"], vec!["ron"]);
        assert_eq!(request.header("x-many").unwrap().len(), 2);
        assert_eq!(request.body.content_type().unwrap().kind(), BodyKind::Json);
    }

    #[test]
    fn test_empty_request_has_empty_body() {
        let (parts, _) = Request::builder().uri("/").body(()).unwrap().into_parts();
        let request = to_contract_request(&parts, Bytes::new());
        assert_eq!(request.body, OptionalBody::Empty);
        assert!(request.query.is_none());
        assert!(request.headers.is_none());
    }
}
