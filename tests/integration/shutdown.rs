//! Graceful shutdown of the HTTP front end.

use std::time::Duration;

use php_embed_bridge::sapi::Bridge;
use php_embed_bridge::ScriptExecutor;
use reqwest::StatusCode;

use super::helpers::*;

#[tokio::test]
async fn test_stop_refuses_new_connections() {
    let mut server = TestServer::fallback().await;
    assert_status(&server.get("/").await, StatusCode::OK);

    server.stop().await;
    assert!(server.server.wait_for_drain(Duration::from_secs(5)).await);
    assert_eq!(server.server.active_connections(), 0);

    // Fresh client so no pooled connection is reused; the listener socket
    // stays open, so a refused request shows up as a timeout
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    assert!(client
        .get(format!("{}/", server.base_url))
        .send()
        .await
        .is_err());
}

#[tokio::test]
async fn test_in_flight_request_completes() {
    let mut server = TestServer::start(
        Bridge::with_interpreter(Box::new(ScriptedInterpreter)),
        TestOptions::default(),
    )
    .await;

    let url = format!("{}/slow", server.base_url);
    let client = server.client.clone();
    let in_flight = tokio::spawn(async move { client.get(url).send().await });

    // Let the request reach a worker
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.stop().await;

    let resp = in_flight.await.unwrap().expect("in-flight request failed");
    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "slow done").await;

    assert!(server.server.wait_for_drain(Duration::from_secs(5)).await);
}

#[tokio::test]
async fn test_executor_shutdown_rejects_requests() {
    let server = TestServer::scripted().await;
    let executor = server.server.executor();

    tokio::task::spawn_blocking(move || executor.shutdown())
        .await
        .unwrap();

    let resp = server.get("/").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    assert_header(&resp, "Retry-After", "1");
}

#[tokio::test]
async fn test_readiness_after_executor_shutdown() {
    let server = TestServer::fallback().await;
    assert_status(&server.get("/readyz").await, StatusCode::OK);

    let executor = server.server.executor();
    tokio::task::spawn_blocking(move || executor.shutdown())
        .await
        .unwrap();

    let resp = server.get("/readyz").await;
    assert_status(&resp, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "not_ready");

    // Liveness is unaffected
    let resp = server.get("/healthz").await;
    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "\"ok\"").await;
}
