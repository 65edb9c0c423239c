//! Tests for the CubeMaster HTTP client against a mock service

#![allow(clippy::unwrap_used, clippy::expect_used)]

use cubeport_pipeline::{CubeMasterClient, Optimizer, PipelineConfig, RemoteCallError};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer) -> CubeMasterClient {
    let config = PipelineConfig::new(format!("{}/loads", server.uri()), "test-token");
    CubeMasterClient::new(&config).unwrap()
}

#[tokio::test]
async fn test_optimize_sends_token_and_payload() {
    let server = MockServer::start().await;
    let payload = json!({"containers": [{"type": "40ft"}], "cargoes": [{"name": "box", "qty": 4}]});

    Mock::given(method("POST"))
        .and(path("/loads"))
        .and(header("TokenID", "test-token"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "loadSummary": {"piecesLoaded": 4}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(&server).optimize(&payload).await.unwrap();
    assert_eq!(result["loadSummary"]["piecesLoaded"], 4);
}

#[tokio::test]
async fn test_client_error_uses_message_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/loads"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Container type unknown"})),
        )
        .mount(&server)
        .await;

    let err = client_for(&server).optimize(&json!({})).await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(err.is_client_error());
    assert_eq!(err.message(), "Container type unknown");
}

#[tokio::test]
async fn test_server_error_falls_back_to_raw_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/loads"))
        .respond_with(ResponseTemplate::new(500).set_body_string("solver crashed"))
        .mount(&server)
        .await;

    let err = client_for(&server).optimize(&json!({})).await.unwrap_err();
    assert!(matches!(
        &err,
        RemoteCallError::Status { status: 500, message } if message == "solver crashed"
    ));
    assert!(!err.is_client_error());
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/loads"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut config = PipelineConfig::new(format!("{}/loads", server.uri()), "t");
    config.request_timeout_secs = 1;
    let client = CubeMasterClient::new(&config).unwrap();

    let err = client.optimize(&json!({})).await.unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err:?}");
}

#[tokio::test]
async fn test_non_json_success_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/loads"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).optimize(&json!({})).await.unwrap_err();
    assert!(matches!(err, RemoteCallError::InvalidBody(_)));
}

#[tokio::test]
async fn test_ping_probes_service_root() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    // Any answer below 500 means the service is up
    assert!(client_for(&server).ping().await);
}

#[tokio::test]
async fn test_ping_reports_server_errors_as_unreachable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    assert!(!client_for(&server).ping().await);
}

#[tokio::test]
async fn test_ping_unreachable_host() {
    let config = PipelineConfig::new("http://127.0.0.1:9/loads", "t");
    let client = CubeMasterClient::new(&config).unwrap();
    assert!(!client.ping().await);
}
