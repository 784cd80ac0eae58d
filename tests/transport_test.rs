//! Integration tests for the reqwest transport against a mock HTTP server.
//!
//! The transport is blocking, so every call runs inside `spawn_blocking`.

use pushsync::{
    HttpRequest, MemoryKeyStore, Reconciler, ReqwestTransport, StaticAccount, StaticDevice,
    SubscriptionIntent, Transport, TransportError,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test(flavor = "multi_thread")]
async fn sends_bearer_and_json_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/push/subscription"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({ "hello": "world" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "endpoint": "e" })))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/api/v1/push/subscription", server.uri());
    let response = tokio::task::spawn_blocking(move || {
        let transport = ReqwestTransport::new().unwrap();
        transport.execute(&HttpRequest::post(url, json!({ "hello": "world" })).with_bearer("tok"))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.json, Some(json!({ "endpoint": "e" })));
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/push/subscription"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/api/v1/push/subscription", server.uri());
    let response = tokio::task::spawn_blocking(move || {
        ReqwestTransport::new()
            .unwrap()
            .execute(&HttpRequest::delete(url))
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.status_line(), "404 Not Found");
    assert!(response.json.is_none());
}

#[test]
fn connection_failure_is_unreachable() {
    let transport = ReqwestTransport::new().unwrap();
    let err = transport
        .execute(&HttpRequest::get("http://127.0.0.1:1/api/v1/instance"))
        .unwrap_err();
    assert!(matches!(err, TransportError::Unreachable(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn reconcile_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/push/subscription"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "Record not found" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/instance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "version": "3.1.2" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/webpushtokencheck"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/push/subscription"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 7,
            "endpoint": "ignored",
            "server_key": "BServerKey"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/webpushserverkey"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let (subscribed, cached) = tokio::task::spawn_blocking(move || {
        let transport = ReqwestTransport::new().unwrap();
        let store = MemoryKeyStore::new();
        let result = Reconciler::new(&transport, &store, &base, &base).reconcile(
            &StaticAccount::new("alice", "token-1"),
            &StaticDevice::new("device-1", "install-1"),
            SubscriptionIntent::new(false, false, true, true),
        );
        assert!(result.is_success(), "{}", result.log.render(true));
        (result.subscribed(), store.len())
    })
    .await
    .unwrap();

    assert!(subscribed);
    assert_eq!(cached, 1);
}
