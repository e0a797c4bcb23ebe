//! Requests served by a test interpreter through the worker pool.

use std::time::Duration;

use futures_util::future::join_all;
use php_embed_bridge::sapi::Bridge;
use reqwest::StatusCode;

use super::helpers::*;

#[tokio::test]
async fn test_request_variables_reach_script() {
    let server = TestServer::scripted().await;
    let resp = server
        .get_with_headers(
            "/hello/world?a=1&b=two",
            &[("User-Agent", "integration-test/1.0")],
        )
        .await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "Content-Type", "text/plain");

    let body = resp.text().await.unwrap();
    assert!(body.contains("script=index.php\n"), "body: {}", body);
    assert!(body.contains("method=GET\n"));
    assert!(body.contains("uri=/hello/world?a=1&b=two\n"));
    assert!(body.contains("query=a=1&b=two\n"));
    assert!(body.contains("script_name=/index.php\n"));
    assert!(body.contains("agent=integration-test/1.0\n"));
}

#[tokio::test]
async fn test_post_body_and_cookies() {
    let server = TestServer::scripted().await;
    let resp = server
        .client
        .post(format!("{}/form", server.base_url))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Cookie", "sid=abc; theme=dark")
        .body("name=John+Doe&email=john%40example.com")
        .send()
        .await
        .unwrap();

    assert_status(&resp, StatusCode::OK);
    let body = resp.text().await.unwrap();
    assert!(body.contains("method=POST\n"));
    assert!(body.contains("post=name=John+Doe&email=john%40example.com\n"));
    assert!(body.contains("cookies=sid=abc; theme=dark\n"));
}

#[tokio::test]
async fn test_script_sets_status() {
    let server = TestServer::scripted().await;

    let resp = server.get("/status/404").await;
    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_body_contains(resp, "status 404").await;

    let resp = server.get("/status/201").await;
    assert_status(&resp, StatusCode::CREATED);
}

#[tokio::test]
async fn test_script_headers() {
    let server = TestServer::scripted().await;
    let resp = server.get("/headers").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "Content-Type", "application/json");

    let cookies: Vec<&str> = resp
        .headers()
        .get_all("Set-Cookie")
        .iter()
        .map(|v| v.to_str().unwrap())
        .collect();
    assert_eq!(cookies, vec!["a=1", "b=2"]);

    // Replaced, not duplicated
    assert_eq!(resp.headers().get_all("X-Request-Thread").iter().count(), 1);
    // Script headers replace the defaults entirely
    assert!(resp.headers().get("X-Powered-By").is_none());

    assert_body_contains(resp, "{\"ok\":true}").await;
}

#[tokio::test]
async fn test_script_failure_keeps_partial_output() {
    let server = TestServer::scripted().await;
    let resp = server.get("/fail").await;

    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "partial").await;
}

#[tokio::test]
async fn test_logging_script() {
    let server = TestServer::scripted().await;
    let resp = server.get("/log").await;

    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "logged").await;
}

#[tokio::test]
async fn test_timeout_returns_504() {
    let server = TestServer::start(
        Bridge::with_interpreter(Box::new(ScriptedInterpreter)),
        TestOptions {
            timeout: Some(Duration::from_millis(50)),
            ..TestOptions::default()
        },
    )
    .await;

    let resp = server.get("/slow").await;
    assert_status(&resp, StatusCode::GATEWAY_TIMEOUT);

    // Abandoned job still finishes and frees its worker
    tokio::time::sleep(Duration::from_millis(400)).await;
    let resp = server.get("/").await;
    assert_status(&resp, StatusCode::OK);
}

#[tokio::test]
async fn test_queue_full_returns_503() {
    let server = TestServer::start(
        Bridge::with_interpreter(Box::new(ScriptedInterpreter)),
        TestOptions {
            workers: 1,
            queue_capacity: 1,
            ..TestOptions::default()
        },
    )
    .await;

    let requests = (0..4).map(|_| server.get("/slow"));
    let responses = join_all(requests).await;

    let statuses: Vec<StatusCode> = responses.iter().map(|r| r.status()).collect();
    assert!(
        statuses.contains(&StatusCode::OK),
        "statuses: {:?}",
        statuses
    );
    assert!(
        statuses.contains(&StatusCode::SERVICE_UNAVAILABLE),
        "statuses: {:?}",
        statuses
    );

    let rejected = responses
        .iter()
        .find(|r| r.status() == StatusCode::SERVICE_UNAVAILABLE)
        .unwrap();
    assert_header(rejected, "Retry-After", "1");
}

#[tokio::test]
async fn test_concurrent_requests() {
    let server = TestServer::scripted().await;

    let paths: Vec<String> = (0..10).map(|i| format!("/item?id={}", i)).collect();
    let responses = join_all(paths.iter().map(|p| server.get(p))).await;

    for (i, resp) in responses.into_iter().enumerate() {
        assert_status(&resp, StatusCode::OK);
        let body = resp.text().await.unwrap();
        assert!(body.contains(&format!("query=id={}\n", i)), "body: {}", body);
    }
}
