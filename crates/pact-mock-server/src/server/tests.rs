//! Tests for the server module.
//!
//! Covers:
//! - Serving matched and unmatched requests through a live listener
//! - Mismatch reports and `matched()` coverage
//! - CORS preflight handling
//! - Shutdown and the port registry

use super::*;
use crate::config::MockServerConfig;
use crate::model::Contract;
use std::net::SocketAddr;

const MALLORY: &str = r#"{
    "provider": {"name": "Alice Service"},
    "consumer": {"name": "Consumer"},
    "interactions": [
        {
            "description": "a retrieve Mallory request",
            "request": {"method": "GET", "path": "/mallory", "query": "name=ron&status=good"},
            "response": {
                "status": 200,
                "headers": {"Content-Type": "text/html"},
                "body": "That is some good Mallory."
            }
        }
    ],
    "metadata": {"pact-specification": {"version": "1.0.0"}}
}"#;

const TWO_INTERACTIONS: &str = r#"{
    "provider": {"name": "Alice Service"},
    "consumer": {"name": "Consumer"},
    "interactions": [
        {
            "description": "list users",
            "request": {"method": "GET", "path": "/users"},
            "response": {"status": 200, "body": [{"id": 1}]}
        },
        {
            "description": "create user",
            "request": {
                "method": "POST",
                "path": "/users",
                "headers": {"Content-Type": "application/json"},
                "body": {"name": "ron"}
            },
            "response": {"status": 201}
        }
    ]
}"#;

fn local() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn start(
    contract: &str,
    config: MockServerConfig,
) -> (std::sync::Arc<MockServer>, tokio::task::JoinHandle<()>) {
    let contract = Contract::from_json_str(contract).unwrap();
    MockServer::start(contract, local(), config).await.unwrap()
}

fn url(server: &MockServer, path: &str) -> String {
    format!("http://{}{}", server.address(), path)
}

#[tokio::test]
async fn test_matched_request_gets_contract_response() {
    let (server, _task) = start(MALLORY, MockServerConfig::default()).await;
    assert_eq!(server.state(), ServerState::Running);
    assert!(!server.matched());

    let response = reqwest::get(url(&server, "/mallory?name=ron&status=good"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/html");
    assert_eq!(response.text().await.unwrap(), "That is some good Mallory.");

    assert!(server.matched());
    assert!(server.mismatches().is_empty());
    let recorded = server.recorded_interactions();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].outcome.is_match());
}

#[tokio::test]
async fn test_unmatched_request_gets_500_and_is_reported() {
    let (server, _task) = start(MALLORY, MockServerConfig::default()).await;

    let response = reqwest::get(url(&server, "/mallory?name=someone-else"))
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.headers()[MISMATCH_HEADER], "true");
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("Request-Mismatch"));
    assert!(!body["mismatches"].as_array().unwrap().is_empty());

    assert!(!server.matched());
    let reports = server.mismatches();
    assert_eq!(reports.len(), 1);
    match &reports[0] {
        MismatchReport::RequestMismatch {
            method,
            path,
            interaction,
            mismatches,
        } => {
            assert_eq!(method, "GET");
            assert_eq!(path, "/mallory");
            assert_eq!(interaction, "a retrieve Mallory request");
            assert!(!mismatches.is_empty());
        }
        other => panic!("unexpected report {:?}", other),
    }
}

#[tokio::test]
async fn test_unexercised_interaction_is_missing() {
    let (server, _task) = start(TWO_INTERACTIONS, MockServerConfig::default()).await;

    let response = reqwest::get(url(&server, "/users")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let reports = server.mismatches();
    assert_eq!(
        reports,
        vec![MismatchReport::MissingRequest {
            method: "POST".to_string(),
            path: "/users".to_string(),
            interaction: "create user".to_string(),
        }]
    );

    let response = reqwest::Client::new()
        .post(url(&server, "/users"))
        .header("Content-Type", "application/json")
        .body(r#"{"name": "ron"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    assert!(server.matched());
}

#[tokio::test]
async fn test_empty_contract_is_vacuously_matched() {
    let (server, _task) = start(r#"{"interactions": []}"#, MockServerConfig::default()).await;
    assert!(server.matched());

    let response = reqwest::get(url(&server, "/anything")).await.unwrap();
    assert_eq!(response.status(), 500);
    assert!(matches!(
        server.mismatches()[0],
        MismatchReport::RequestNotFound { .. }
    ));
    assert!(!server.matched());
}

#[tokio::test]
async fn test_cors_preflight_when_enabled() {
    let config = MockServerConfig {
        cors_preflight: true,
        ..MockServerConfig::default()
    };
    let (server, _task) = start(MALLORY, config).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, url(&server, "/mallory"))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Headers", "x-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );
    assert_eq!(response.headers()["access-control-allow-headers"], "x-token");

    // Preflights are not recorded, the only report is the missing request
    assert!(server.recorded_interactions().is_empty());
    assert_eq!(server.mismatches().len(), 1);
}

#[tokio::test]
async fn test_options_is_a_mismatch_without_cors() {
    let (server, _task) = start(MALLORY, MockServerConfig::default()).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, url(&server, "/mallory"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(server.recorded_interactions().len(), 1);
}

#[tokio::test]
async fn test_metrics_count_requests_by_path() {
    let (server, _task) = start(TWO_INTERACTIONS, MockServerConfig::default()).await;
    for _ in 0..2 {
        reqwest::get(url(&server, "/users")).await.unwrap();
    }
    reqwest::get(url(&server, "/other")).await.unwrap();

    let metrics = server.metrics();
    assert_eq!(metrics.total_requests, 3);
    assert_eq!(metrics.requests_by_path["/users"], 2);
    assert_eq!(metrics.requests_by_path["/other"], 1);
}

#[tokio::test]
async fn test_shutdown_stops_listener() {
    let (server, task) = start(MALLORY, MockServerConfig::default()).await;
    let address = server.address();

    assert!(server.shutdown());
    task.await.unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
    assert!(!server.shutdown());

    assert!(tokio::net::TcpStream::connect(address).await.is_err());
}

#[tokio::test]
async fn test_shutdown_does_not_wait_past_drain_timeout() {
    let config = MockServerConfig {
        drain_timeout_ms: 100,
        ..MockServerConfig::default()
    };
    let (server, task) = start(MALLORY, config).await;

    // An idle connection that never sends a request
    let _idle = tokio::net::TcpStream::connect(server.address()).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    server.shutdown();
    tokio::time::timeout(std::time::Duration::from_secs(5), task)
        .await
        .expect("shutdown should finish within the drain timeout")
        .unwrap();
    assert_eq!(server.state(), ServerState::Stopped);
}

// ============================================================================
// ServerManager
// ============================================================================

fn blocking_get(url: &str) -> (u16, String) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let response = reqwest::get(url).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    })
}

#[test]
fn test_manager_lifecycle() {
    let manager = ServerManager::new(1).unwrap();
    let port = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();
    assert!(port > 0);
    assert_eq!(manager.ports(), vec![port]);
    assert!(!manager.matched(port).unwrap());

    let (status, body) = blocking_get(&format!(
        "http://127.0.0.1:{}/mallory?name=ron&status=good",
        port
    ));
    assert_eq!(status, 200);
    assert_eq!(body, "That is some good Mallory.");
    assert!(manager.matched(port).unwrap());

    assert_eq!(manager.shutdown_mock_server(port).unwrap(), Cleanup::Stopped);
    assert_eq!(
        manager.shutdown_mock_server(port).unwrap(),
        Cleanup::AlreadyStopped
    );
    assert!(manager.ports().is_empty());
    assert!(matches!(
        manager.matched(port),
        Err(crate::error::MockServerError::NotFound(_))
    ));
}

#[test]
fn test_manager_rejects_bad_input() {
    let manager = ServerManager::new(1).unwrap();

    let err = manager
        .start_mock_server("{not json", "127.0.0.1:0", MockServerConfig::default())
        .unwrap_err();
    assert_eq!(err.error_code(), -2);

    let err = manager
        .start_mock_server(MALLORY, "nowhere", MockServerConfig::default())
        .unwrap_err();
    assert_eq!(err.error_code(), -5);

    assert!(manager.ports().is_empty());
}

#[test]
fn test_manager_bind_conflict() {
    let manager = ServerManager::new(1).unwrap();
    let port = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();

    let err = manager
        .start_mock_server(
            MALLORY,
            &format!("127.0.0.1:{}", port),
            MockServerConfig::default(),
        )
        .unwrap_err();
    assert_eq!(err.error_code(), -3);
    assert_eq!(manager.ports(), vec![port]);
}

#[test]
fn test_manager_unknown_port() {
    let manager = ServerManager::new(1).unwrap();
    assert!(manager.find_mock_server(9).is_none());
    assert!(manager.mismatches(9).is_err());
    assert!(matches!(
        manager.shutdown_mock_server(9),
        Err(crate::error::MockServerError::NotFound(9))
    ));
}

#[test]
fn test_manager_shutdown_all() {
    let manager = ServerManager::new(2).unwrap();
    let first = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();
    let second = manager
        .start_mock_server(TWO_INTERACTIONS, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();
    assert_ne!(first, second);

    let mut stopped = manager.shutdown_all();
    stopped.sort_unstable();
    let mut expected = vec![first, second];
    expected.sort_unstable();
    assert_eq!(stopped, expected);
    assert!(manager.ports().is_empty());
}

#[test]
fn test_manager_writes_pact_file() {
    let manager = ServerManager::new(1).unwrap();
    let port = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();
    let dir = tempfile::tempdir().unwrap();

    let path = manager
        .write_pact_file(port, Some(dir.path()), false)
        .unwrap();
    let written = Contract::from_json_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(&written, manager.find_mock_server(port).unwrap().contract());

    manager.shutdown_mock_server(port).unwrap();
    assert!(matches!(
        manager.write_pact_file(port, Some(dir.path()), false),
        Err(crate::error::MockServerError::NotFound(_))
    ));
}

#[test]
fn test_manager_cleanup_while_draining() {
    use std::io::Write;

    let manager = ServerManager::new(1).unwrap();
    let config = MockServerConfig {
        drain_timeout_ms: 1500,
        ..MockServerConfig::default()
    };
    let port = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", config)
        .unwrap();

    // A request whose body never finishes keeps the connection busy
    let mut stream = std::net::TcpStream::connect(("127.0.0.1", port)).unwrap();
    stream
        .write_all(b"POST /mallory HTTP/1.1\r\nHost: localhost\r\nContent-Length: 100\r\n\r\npartial")
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(100));

    let (first, second) = std::thread::scope(|scope| {
        let first = scope.spawn(|| manager.shutdown_mock_server(port));
        std::thread::sleep(std::time::Duration::from_millis(300));
        let second = manager.shutdown_mock_server(port);
        (first.join().unwrap(), second)
    });

    assert_eq!(first.unwrap(), Cleanup::Stopped);
    assert_eq!(second.unwrap(), Cleanup::AlreadyStopped);
    assert!(manager.ports().is_empty());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_unmatched_request_is_logged() {
    let (server, _task) = start(MALLORY, MockServerConfig::default()).await;
    reqwest::get(url(&server, "/mallory?name=someone-else"))
        .await
        .unwrap();
    assert!(logs_contain("did not match"));
    assert!(logs_contain("a retrieve Mallory request"));
}
