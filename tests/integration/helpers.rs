//! Test helpers and utilities

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use php_embed_bridge::executor::EngineExecutor;
use php_embed_bridge::sapi::{Bridge, Engine, Interpreter, LogType, Session};
use php_embed_bridge::server::{Server, Site};
use reqwest::{Client, Response, StatusCode};
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Server running in-process on an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub server: Arc<Server<EngineExecutor>>,
    /// Document root; removed on drop
    pub root: TempDir,
    handle: Option<JoinHandle<std::io::Result<()>>>,
}

/// Knobs for [`TestServer::start`].
pub struct TestOptions {
    pub workers: usize,
    pub queue_capacity: usize,
    pub timeout: Option<Duration>,
    /// Files created in the document root before the entry point is detected
    pub files: Vec<&'static str>,
    pub static_cache_control: Option<&'static str>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 0,
            timeout: Some(Duration::from_secs(10)),
            files: vec!["index.php"],
            static_cache_control: None,
        }
    }
}

#[allow(dead_code)]
impl TestServer {
    /// Server without an interpreter (fallback pages).
    pub async fn fallback() -> Self {
        Self::start(Bridge::fallback(), TestOptions::default()).await
    }

    /// Server running [`ScriptedInterpreter`].
    pub async fn scripted() -> Self {
        Self::start(
            Bridge::with_interpreter(Box::new(ScriptedInterpreter)),
            TestOptions::default(),
        )
        .await
    }

    pub async fn start(bridge: Bridge, options: TestOptions) -> Self {
        let root = tempfile::tempdir().expect("Failed to create document root");
        for file in &options.files {
            let path = root.path().join(file);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, "<?php echo 'hello';").unwrap();
        }

        let entry_point = php_embed_bridge::php::detect_entry_point(root.path(), "auto");

        let engine = Engine::new("8.3", bridge).expect("Failed to create engine");
        engine.startup().expect("Engine startup failed");

        let executor = EngineExecutor::new(
            Arc::new(engine),
            options.workers,
            options.queue_capacity,
            options.timeout,
        )
        .expect("Failed to create executor");

        let server = Server::bind(
            "127.0.0.1:0".parse().unwrap(),
            Site::new(root.path(), &entry_point),
            Arc::new(executor),
        )
        .await
        .expect("Failed to bind server")
        .with_drain_timeout(Duration::from_secs(5))
        .with_static_cache_control(options.static_cache_control);

        let server = Arc::new(server);
        let base_url = format!("http://{}", server.local_addr());

        let handle = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url,
            client,
            server,
            root,
            handle: Some(handle),
        }
    }

    pub fn document_root(&self) -> &Path {
        self.root.path()
    }

    /// Write a file under the document root.
    pub fn write_file(&self, relative: &str, contents: &[u8]) {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Make a POST request with a raw body
    pub async fn post(&self, path: &str, content_type: &str, body: &'static str) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("Content-Type", content_type)
            .body(body)
            .send()
            .await
            .expect("POST request failed")
    }

    /// Make a HEAD request
    pub async fn head(&self, path: &str) -> Response {
        self.client
            .head(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("HEAD request failed")
    }

    /// Trigger shutdown and wait for the accept loop to exit.
    pub async fn stop(&mut self) {
        self.server.trigger_shutdown();
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .expect("Server task panicked")
                .expect("Server returned an error");
        }
    }
}

/// Test interpreter that routes on `REQUEST_URI`:
///
/// - `/status/<code>` sets the status
/// - `/headers` sets several headers
/// - `/slow` sleeps 300ms
/// - `/log` logs a warning
/// - `/fail` writes partial output then fails
/// - anything else echoes the request
pub struct ScriptedInterpreter;

impl ScriptedInterpreter {
    fn var<'a>(session: &'a Session<'_>, key: &str) -> &'a str {
        session
            .server_vars()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

impl Interpreter for ScriptedInterpreter {
    fn startup(&self, _version_hint: &str) -> Result<(), String> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn execute(&self, session: &mut Session<'_>) -> Result<(), String> {
        let uri = Self::var(session, "REQUEST_URI").to_string();
        let path = uri.split('?').next().unwrap_or("").to_string();

        if let Some(code) = path.strip_prefix("/status/") {
            let code: u16 = code.parse().map_err(|_| "bad status".to_string())?;
            session.set_status(code);
            session.write(format!("status {}", code).as_bytes());
            return Ok(());
        }

        match path.as_str() {
            "/headers" => {
                session
                    .add_header("Content-Type: application/json")
                    .map_err(|e| e.to_string())?;
                session
                    .add_header("Set-Cookie: a=1")
                    .map_err(|e| e.to_string())?;
                session
                    .add_header("Set-Cookie: b=2")
                    .map_err(|e| e.to_string())?;
                session
                    .add_header("X-Request-Thread: 0")
                    .map_err(|e| e.to_string())?;
                session
                    .replace_header(&format!("X-Request-Thread: {}", session.thread_index()))
                    .map_err(|e| e.to_string())?;
                session.write(b"{\"ok\":true}");
            }
            "/slow" => {
                std::thread::sleep(Duration::from_millis(300));
                session.write(b"slow done");
            }
            "/log" => {
                session.log("Deprecated: something old", LogType::WARNING);
                session.write(b"logged");
            }
            "/fail" => {
                session.write(b"partial");
                return Err("PHP Parse error: syntax error".into());
            }
            _ => {
                let mut post = Vec::new();
                let mut buf = [0u8; 16];
                loop {
                    let n = session.read_post(&mut buf);
                    if n == 0 {
                        break;
                    }
                    post.extend_from_slice(&buf[..n]);
                }

                session
                    .add_header("Content-Type: text/plain")
                    .map_err(|e| e.to_string())?;

                let body = format!(
                    "script={}\nthread={}\nmethod={}\nuri={}\nquery={}\nscript_name={}\nagent={}\ncookies={}\npost={}\n",
                    session.script(),
                    session.thread_index(),
                    Self::var(session, "REQUEST_METHOD"),
                    uri,
                    Self::var(session, "QUERY_STRING"),
                    Self::var(session, "SCRIPT_NAME"),
                    Self::var(session, "HTTP_USER_AGENT"),
                    session.read_cookies().unwrap_or_default(),
                    String::from_utf8_lossy(&post),
                );
                session.write(body.as_bytes());
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header
pub fn assert_header(response: &Response, name: &str, expected: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert_eq!(value, expected, "Header '{}' mismatch", name);
}

/// Assert that response contains header with prefix
pub fn assert_header_starts_with(response: &Response, name: &str, prefix: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert!(
        value.starts_with(prefix),
        "Header '{}' expected to start with '{}', got '{}'",
        name,
        prefix,
        value
    );
}

/// Assert that response body contains substring
pub async fn assert_body_contains(response: Response, substring: &str) {
    let body = response.text().await.expect("Failed to read body");
    assert!(
        body.contains(substring),
        "Body does not contain '{}'. Body: {}",
        substring,
        &body[..body.len().min(500)]
    );
}
