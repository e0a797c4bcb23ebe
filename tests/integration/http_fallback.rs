//! Requests served without an interpreter.

use reqwest::StatusCode;

use super::helpers::*;

#[tokio::test]
async fn test_fallback_page() {
    let server = TestServer::fallback().await;
    let resp = server.get("/").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "X-Powered-By", "php-embed-bridge");
    assert_header_starts_with(&resp, "Content-Type", "text/html");
    assert_header_starts_with(&resp, "Server", "php_embed_bridge/");

    let body = resp.text().await.unwrap();
    assert!(body.contains("fallback mode"));
    assert!(body.contains("<code>index.php</code>"));
    assert!(body.contains("Thread: "));
}

#[tokio::test]
async fn test_script_paths_run_entry_point() {
    let server = TestServer::fallback().await;

    // Neither a health endpoint nor an existing static file
    for path in ["/", "/users/42", "/missing.php?x=1", "/missing.css", "/index.php"] {
        let resp = server.get(path).await;
        assert_status(&resp, StatusCode::OK);
        assert_header(&resp, "X-Powered-By", "php-embed-bridge");
        assert_body_contains(resp, "<code>index.php</code>").await;
    }
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::fallback().await;

    for (path, status) in [
        ("/health", "ok"),
        ("/healthz", "ok"),
        ("/ready", "ready"),
        ("/readyz", "ready"),
    ] {
        let resp = server.get(path).await;
        assert_status(&resp, StatusCode::OK);
        assert_header(&resp, "Content-Type", "application/json");
        assert_header(&resp, "Cache-Control", "no-store");
        assert!(resp.headers().get("X-Powered-By").is_none());

        let json: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(json["status"], status, "{}", path);
        assert_eq!(json["backend"], "fallback");
        assert_eq!(json["workers"]["workers"], 2);
    }
}

#[tokio::test]
async fn test_static_file_served() {
    let server = TestServer::fallback().await;
    server.write_file("assets/app.css", b"body { color: red; }");
    server.write_file("favicon.ico", &[0, 0, 1, 0]);

    let resp = server.get("/assets/app.css").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "Content-Type", "text/css");
    assert_header_starts_with(&resp, "Server", "php_embed_bridge/");
    assert!(resp.headers().get("X-Powered-By").is_none());
    assert!(resp.headers().get("Cache-Control").is_none());
    assert_eq!(resp.text().await.unwrap(), "body { color: red; }");

    let resp = server.get("/favicon.ico?v=2").await;
    assert_status(&resp, StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &[0, 0, 1, 0]);

    let resp = server.head("/assets/app.css").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "Content-Type", "text/css");
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_static_cache_control() {
    let server = TestServer::start(
        php_embed_bridge::sapi::Bridge::fallback(),
        TestOptions {
            files: vec!["index.php", "app.js"],
            static_cache_control: Some("public, max-age=3600"),
            ..TestOptions::default()
        },
    )
    .await;

    let resp = server.get("/app.js").await;
    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "Cache-Control", "public, max-age=3600");
    assert_body_contains(resp, "echo 'hello'").await;
}

#[tokio::test]
async fn test_static_lookup_stays_in_document_root() {
    let server = TestServer::fallback().await;
    server.write_file("assets/app.css", b"body{}");

    // Traversal and non-GET methods fall through to the entry point
    let resp = server.get("/assets/%2e%2e/%2e%2e/etc/passwd.txt").await;
    assert_body_contains(resp, "<code>index.php</code>").await;

    let resp = server
        .post("/assets/app.css", "text/plain", "x")
        .await;
    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "fallback mode").await;
}

#[tokio::test]
async fn test_public_index_detected() {
    let server = TestServer::start(
        php_embed_bridge::sapi::Bridge::fallback(),
        TestOptions {
            files: vec!["public/index.php", "index.php"],
            ..TestOptions::default()
        },
    )
    .await;

    assert_eq!(server.server.site().entry_point(), "public/index.php");
    let resp = server.get("/").await;
    assert_body_contains(resp, "<code>public/index.php</code>").await;
}

#[tokio::test]
async fn test_head_has_no_body() {
    let server = TestServer::fallback().await;
    let resp = server.head("/").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "X-Powered-By", "php-embed-bridge");
    let body = resp.bytes().await.unwrap();
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_post_accepted() {
    let server = TestServer::fallback().await;
    let resp = server
        .post("/submit", "application/x-www-form-urlencoded", "name=test")
        .await;

    assert_status(&resp, StatusCode::OK);
    assert_body_contains(resp, "fallback mode").await;
}

#[tokio::test]
async fn test_document_root_is_temporary() {
    let server = TestServer::fallback().await;
    assert!(server.document_root().join("index.php").exists());
    assert_eq!(
        server.server.site().document_root(),
        server.document_root().to_string_lossy()
    );
}
