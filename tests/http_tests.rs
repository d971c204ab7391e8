//! Tests for outbound HTTP through the sandbox

mod common;

use cim_domain_interaction::{
    ErrorKind, HttpError, InteractionError, Method, RequestOptions, Sandbox,
};
use common::*;
use serde_json::json;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn test_json_api_through_sandbox() {
    let transport = Arc::new(StubTransport::new().reply(
        "http://api.example/users?page=2",
        200,
        r#"{"users": ["jane"]}"#,
    ));
    let sandbox = Sandbox::in_memory().with_http(transport.clone());

    let api = assert_ok!(sandbox.json_api()).with_basic_auth("app", "secret");
    let response = assert_ok!(
        api.get("http://api.example/users", RequestOptions::new().param("page", 2))
            .await
    );

    assert_eq!(response.data, Some(json!({"users": ["jane"]})));

    let requests = transport.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::Get);
    assert_eq!(
        requests[0].headers.get("Authorization"),
        Some(&vec!["Basic YXBwOnNlY3JldA==".to_string()])
    );
}

#[tokio::test]
async fn test_put_and_delete_send_their_methods() {
    let transport = Arc::new(
        StubTransport::new()
            .reply("http://api.example/users/1", 204, "")
            .reply("http://api.example/users/2", 200, "gone"),
    );
    let api = assert_ok!(Sandbox::in_memory().with_http(transport.clone()).http());

    let response = assert_ok!(
        api.put(
            "http://api.example/users/1",
            RequestOptions::new().data("name=jane")
        )
        .await
    );
    assert_eq!(response.code, 204);
    assert_eq!(response.request.body.as_deref(), Some("name=jane"));

    let response = assert_ok!(
        api.delete("http://api.example/users/2", RequestOptions::new())
            .await
    );
    assert_eq!(response.data, Some(json!("gone")));

    let methods: Vec<Method> = transport
        .requests
        .lock()
        .await
        .iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, vec![Method::Put, Method::Delete]);
}

#[tokio::test]
async fn test_error_responses_become_interaction_errors() {
    let transport = Arc::new(StubTransport::new().reply(
        "http://api.example/missing",
        404,
        "404 Not Found",
    ));
    let api = assert_ok!(Sandbox::in_memory().with_http(transport).http());

    let err = assert_err!(
        api.post("http://api.example/missing", RequestOptions::new())
            .await
    );
    assert!(matches!(err, HttpError::Response { .. }));
    assert_eq!(err.response().map(|r| r.code), Some(404));

    let err = InteractionError::from(err);
    assert_eq!(err.kind(), ErrorKind::Http);
    assert!(err.message().contains("404"));
    assert!(err.cause().is_some());
}

#[test]
fn test_missing_transport_is_configuration_error() {
    let err = assert_err!(Sandbox::in_memory().json_api());
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
