//! Integration tests for the mock server registry and matching engine.
//!
//! These drive real listeners through `ServerManager` and check the
//! matching engine's properties over generated inputs.

use assert_json_diff::{assert_json_eq, assert_json_include};
use pact_mock_server::model::{
    Category, Contract, DocPath, HttpPartBuilder, Interaction, MatchingRule, Request,
};
use pact_mock_server::{
    match_request, select_interaction, Cleanup, MockServerConfig, Selection, ServerManager,
};
use proptest::prelude::*;
use serde_json::json;

const MALLORY: &str = r#"{
    "provider": {"name": "Alice Service"},
    "consumer": {"name": "Consumer"},
    "interactions": [
        {
            "description": "a retrieve Mallory request",
            "provider_state": "Mallory exists",
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

const USERS: &str = r#"{
    "provider": {"name": "User Service"},
    "consumer": {"name": "Web"},
    "interactions": [
        {
            "description": "a user by id",
            "request": {
                "method": "GET",
                "path": "/users/42",
                "matchingRules": {"$.path": {"match": "regex", "regex": "/users/\\d+"}}
            },
            "response": {
                "status": 200,
                "headers": {"Content-Type": "application/json"},
                "body": {"id": 42, "name": "ron", "tags": ["admin"]},
                "matchingRules": {"$.body.tags": {"min": 1, "match": "type"}}
            }
        },
        {
            "description": "create a user",
            "request": {
                "method": "POST",
                "path": "/users",
                "headers": {"Content-Type": "application/json"},
                "body": {"name": "ron", "age": 30},
                "matchingRules": {
                    "body": {
                        "$.name": {"matchers": [{"match": "type"}]},
                        "$.age": {"matchers": [{"match": "type"}]}
                    }
                }
            },
            "response": {"status": 201}
        }
    ]
}"#;

fn get(url: &str) -> (u16, String) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        let response = reqwest::get(url).await.unwrap();
        (response.status().as_u16(), response.text().await.unwrap())
    })
}

fn post_json(url: &str, body: serde_json::Value) -> u16 {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime.block_on(async {
        reqwest::Client::new()
            .post(url)
            .json(&body)
            .send()
            .await
            .unwrap()
            .status()
            .as_u16()
    })
}

#[test]
fn test_mallory_matched() {
    let manager = ServerManager::global().unwrap();
    let port = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();

    let (status, body) = get(&format!(
        "http://127.0.0.1:{port}/mallory?name=ron&status=good"
    ));
    assert_eq!(status, 200);
    assert_eq!(body, "That is some good Mallory.");
    assert!(manager.matched(port).unwrap());

    assert_eq!(manager.shutdown_mock_server(port).unwrap(), Cleanup::Stopped);
}

#[test]
fn test_mallory_mismatch_report() {
    let manager = ServerManager::global().unwrap();
    let port = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();

    let (status, _) = get(&format!("http://127.0.0.1:{port}/mallory?name=someone-else"));
    assert_eq!(status, 500);
    assert!(!manager.matched(port).unwrap());

    let report = serde_json::to_value(manager.mismatches(port).unwrap()).unwrap();
    assert_json_eq!(
        report,
        json!([
            {
                "type": "request-mismatch",
                "method": "GET",
                "path": "/mallory",
                "interaction": "a retrieve Mallory request",
                "mismatches": [
                    {
                        "type": "QueryMismatch",
                        "path": "name",
                        "expected": ["ron"],
                        "actual": ["someone-else"],
                        "description": "Expected 'ron' but received 'someone-else' for query parameter 'name' at index 0"
                    },
                    {
                        "type": "QueryMismatch",
                        "path": "status",
                        "expected": ["good"],
                        "actual": null,
                        "description": "Expected query parameter 'status' but was missing"
                    }
                ]
            }
        ])
    );

    assert_eq!(manager.shutdown_mock_server(port).unwrap(), Cleanup::Stopped);
    assert_eq!(
        manager.shutdown_mock_server(port).unwrap(),
        Cleanup::AlreadyStopped
    );
}

#[test]
fn test_rules_relax_matching_end_to_end() {
    let manager = ServerManager::new(1).unwrap();
    let port = manager
        .start_mock_server(USERS, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();

    let (status, body) = get(&format!("http://127.0.0.1:{port}/users/7"));
    assert_eq!(status, 200);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_json_include!(actual: body, expected: json!({"id": 42, "name": "ron"}));

    let status = post_json(
        &format!("http://127.0.0.1:{port}/users"),
        json!({"name": "hermione", "age": 19}),
    );
    assert_eq!(status, 201);
    assert!(manager.matched(port).unwrap());

    // Wrong type for `age`
    let status = post_json(
        &format!("http://127.0.0.1:{port}/users"),
        json!({"name": "hermione", "age": "19"}),
    );
    assert_eq!(status, 500);

    let report = serde_json::to_value(manager.mismatches(port).unwrap()).unwrap();
    assert_json_include!(
        actual: report,
        expected: json!([
            {
                "type": "request-mismatch",
                "interaction": "create a user",
                "mismatches": [{"type": "BodyMismatch", "path": "$.age"}]
            }
        ])
    );
    manager.shutdown_all();
}

#[test]
fn test_zero_interactions_matched_immediately() {
    let manager = ServerManager::new(1).unwrap();
    let port = manager
        .start_mock_server(
            r#"{"consumer": {"name": "a"}, "provider": {"name": "b"}, "interactions": []}"#,
            "127.0.0.1:0",
            MockServerConfig::default(),
        )
        .unwrap();
    assert!(manager.matched(port).unwrap());
    assert!(manager.mismatches(port).unwrap().is_empty());
}

#[test]
fn test_concurrent_servers_are_independent() {
    let manager = ServerManager::new(2).unwrap();
    let first = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();
    let second = manager
        .start_mock_server(MALLORY, "127.0.0.1:0", MockServerConfig::default())
        .unwrap();

    let (status, _) = get(&format!(
        "http://127.0.0.1:{first}/mallory?name=ron&status=good"
    ));
    assert_eq!(status, 200);

    assert!(manager.matched(first).unwrap());
    assert!(!manager.matched(second).unwrap());

    manager.shutdown_mock_server(first).unwrap();
    assert!(!manager.matched(second).unwrap());
    assert_eq!(manager.ports(), vec![second]);
}

// ============================================================================
// Matching engine properties
// ============================================================================

fn request_strategy() -> impl Strategy<Value = Request> {
    (
        prop::sample::select(vec!["GET", "POST", "PUT", "DELETE"]),
        "/[a-z]{1,8}(/[a-z0-9]{1,8}){0,2}",
        prop::collection::btree_map("[a-z]{1,6}", prop::collection::vec("[a-z0-9]{0,6}", 1..3), 0..4),
        prop::collection::btree_map("x-[a-z]{1,6}", "[a-zA-Z0-9]{1,10}", 0..3),
        prop::option::of("[a-z ]{0,20}"),
    )
        .prop_map(|(method, path, query, headers, body)| {
            let mut request = Request::default();
            request.with_method_and_path(method, &path);
            for (key, values) in &query {
                for (index, value) in values.iter().enumerate() {
                    request.with_query_parameter(key, index, value.clone());
                }
            }
            for (name, value) in headers {
                request.with_header(&name, 0, value);
            }
            if let Some(body) = body {
                request.with_body(Some("text/plain"), &body);
            }
            request
        })
}

proptest! {
    #[test]
    fn test_copied_request_always_matches(request in request_strategy()) {
        prop_assert!(match_request(&request, &request.clone()).is_empty());
    }

    #[test]
    fn test_unrelated_query_key_order_is_ignored(
        first in prop::collection::vec("[a-z0-9]{1,4}", 1..3),
        second in prop::collection::vec("[a-z0-9]{1,4}", 1..3),
    ) {
        let join = |key: &str, values: &[String]| {
            values.iter().map(|v| format!("{key}={v}")).collect::<Vec<_>>().join("&")
        };
        let contract = json!({
            "interactions": [{
                "description": "query",
                "request": {"path": "/q", "query": format!("{}&{}", join("a", &first), join("b", &second))},
                "response": {}
            }]
        });
        let contract = Contract::from_json(&contract).unwrap();

        let mut actual = Request::default();
        actual.with_method_and_path("GET", "/q");
        for (index, value) in second.iter().enumerate() {
            actual.with_query_parameter("b", index, value.clone());
        }
        for (index, value) in first.iter().enumerate() {
            actual.with_query_parameter("a", index, value.clone());
        }
        prop_assert_eq!(select_interaction(&contract, &actual), Selection::Matched(0));
    }

    #[test]
    fn test_repeated_key_value_order_matters(
        values in prop::collection::vec("[a-z]{1,4}", 2..4)
            .prop_filter("values must differ", |v| v.first() != v.last()),
    ) {
        let mut expected = Request::default();
        let mut actual = Request::default();
        for (index, value) in values.iter().enumerate() {
            expected.with_query_parameter("k", index, value.clone());
        }
        for (index, value) in values.iter().rev().enumerate() {
            actual.with_query_parameter("k", index, value.clone());
        }
        prop_assert!(!match_request(&expected, &actual).is_empty());
    }

    #[test]
    fn test_type_rule_accepts_any_value_of_same_type(
        expected_value in any::<i64>(),
        actual_value in any::<i64>(),
        wrong in "[a-z]{0,8}",
    ) {
        let mut interaction = Interaction::new("typed");
        interaction
            .request
            .with_method_and_path("POST", "/typed")
            .with_body(Some("application/json"), &json!({"count": expected_value}).to_string());
        interaction.request.matching_rules.add_rule(
            Category::Body,
            DocPath::parse("$.count").unwrap(),
            MatchingRule::Type,
        );

        let mut actual = Request::default();
        actual
            .with_method_and_path("POST", "/typed")
            .with_body(Some("application/json"), &json!({"count": actual_value}).to_string());
        prop_assert!(match_request(&interaction.request, &actual).is_empty());

        let mut actual = Request::default();
        actual
            .with_method_and_path("POST", "/typed")
            .with_body(Some("application/json"), &json!({"count": wrong}).to_string());
        let mismatches = match_request(&interaction.request, &actual);
        prop_assert_eq!(mismatches.len(), 1);
        prop_assert_eq!(mismatches[0].path.as_str(), "$.count");
    }
}
