//! Integration tests for MedAgent
//!
//! Runs the full runtime -> envelope -> REST adapter -> HTTP path against a
//! throwaway local HTTP responder.

use medagent::config::{Config, SourceConfig};
use medagent::tools::{Params, ResponseFormat, ToolRuntime};
use serde_json::json;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Canned response: status, content type, body
type Reply = (u16, &'static str, &'static str);

/// Minimal HTTP/1.1 responder replaying scripted replies
struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    async fn start(script: Vec<Reply>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(Mutex::new(VecDeque::from(script)));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let seen = requests.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let script = script.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let request = String::from_utf8_lossy(&buf);
                    let request_line = request.lines().next().unwrap_or_default().to_string();
                    seen.lock().unwrap().push(request_line);

                    let (status, content_type, body) = script
                        .lock()
                        .unwrap()
                        .pop_front()
                        .unwrap_or((500, "text/plain", "script exhausted"));
                    let response = format!(
                        "HTTP/1.1 {} Scripted\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        content_type,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        Self { addr, requests }
    }

    fn base_url(&self) -> String {
        format!("http://{}/eutils/", self.addr)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Runtime with a single `mock` source pointed at the responder
fn runtime_for(server: &MockServer, cache_enabled: bool) -> ToolRuntime {
    let mut config = Config::default();
    config.sources.clear();

    let mut source = SourceConfig::new("Mock", &server.base_url(), 50.0);
    source.max_retries = Some(2);
    source.timeout_secs = Some(5);
    config.sources.insert("mock".to_string(), source);

    // smallest legal base keeps real-time backoff at or under one second
    config.retry.backoff_base = 1.0;
    config.cache.enabled = cache_enabled;

    ToolRuntime::from_config(config).unwrap()
}

fn search_params() -> Params {
    let mut params = Params::new();
    params.insert("db".into(), json!("pubmed"));
    params.insert("term".into(), json!("EGFR"));
    params
}

#[tokio::test]
async fn test_fetch_json_success() {
    let server = MockServer::start(vec![(
        200,
        "application/json",
        r#"{"esearchresult":{"idlist":["111","222"]}}"#,
    )])
    .await;
    let runtime = runtime_for(&server, true);

    let result = runtime
        .fetch(
            "mock",
            "esearch.fcgi",
            "EGFR",
            &search_params(),
            ResponseFormat::JsonPointer("/esearchresult/idlist".into()),
        )
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.data, Some(json!(["111", "222"])));
    assert_eq!(result.metadata.results_count, 2);
    assert_eq!(result.metadata.tool, "mock");
    assert!(!result.metadata.cached);

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /eutils/esearch.fcgi?"));
    assert!(requests[0].contains("term=EGFR"));
    assert!(requests[0].contains("db=pubmed"));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start(vec![
        (503, "text/plain", "maintenance"),
        (200, "application/json", r#"[{"nct_id":"NCT01"}]"#),
    ])
    .await;
    let runtime = runtime_for(&server, true);

    let result = runtime
        .fetch("mock", "studies", "asthma", &Params::new(), ResponseFormat::Json)
        .await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(server.requests().len(), 2);

    let stats = runtime.envelope().stats("mock").unwrap();
    assert_eq!(stats.retry_attempts, 1);
    assert_eq!(stats.successful_calls, 1);
}

#[tokio::test]
async fn test_not_found_fails_fast() {
    let server = MockServer::start(vec![(404, "text/plain", "no such endpoint")]).await;
    let runtime = runtime_for(&server, true);

    let result = runtime
        .fetch("mock", "nothing", "x", &Params::new(), ResponseFormat::Json)
        .await;

    assert!(!result.success);
    assert!(result.data.is_none());
    let error = result.error.unwrap();
    assert!(error.contains("404"), "unexpected error: {}", error);
    assert!(error.contains("no such endpoint"));
    assert_eq!(server.requests().len(), 1);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_error() {
    let server = MockServer::start(vec![
        (500, "text/plain", "first"),
        (502, "text/plain", "second"),
        (429, "text/plain", "third"),
    ])
    .await;
    let runtime = runtime_for(&server, true);

    let result = runtime
        .fetch("mock", "studies", "q", &Params::new(), ResponseFormat::Json)
        .await;

    assert!(!result.success);
    // max_retries = 2 -> three attempts
    assert_eq!(server.requests().len(), 3);
    assert!(result.error.unwrap().contains("HTTP 429: third"));
    assert!(runtime.envelope().cache().is_empty());
}

#[tokio::test]
async fn test_cache_serves_repeat_calls() {
    let server = MockServer::start(vec![(200, "application/json", r#"{"count":1}"#)]).await;
    let runtime = runtime_for(&server, true);

    let first = runtime
        .fetch("mock", "einfo.fcgi", "info", &search_params(), ResponseFormat::Json)
        .await;
    let second = runtime
        .fetch("mock", "einfo.fcgi", "info", &search_params(), ResponseFormat::Json)
        .await;

    assert!(first.success && second.success);
    assert!(second.metadata.cached);
    assert_eq!(first.data, second.data);
    assert_eq!(server.requests().len(), 1);

    // a different normalization must not be served from the JSON entry
    let text = runtime
        .fetch("mock", "einfo.fcgi", "info", &search_params(), ResponseFormat::Text)
        .await;
    assert!(!text.metadata.cached);
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_disabled_cache_hits_network_each_time() {
    let server = MockServer::start(vec![
        (200, "application/json", r#"{"count":1}"#),
        (200, "application/json", r#"{"count":1}"#),
    ])
    .await;
    let runtime = runtime_for(&server, false);

    for _ in 0..2 {
        let result = runtime
            .fetch("mock", "einfo.fcgi", "info", &search_params(), ResponseFormat::Json)
            .await;
        assert!(result.success);
        assert!(!result.metadata.cached);
    }
    assert_eq!(server.requests().len(), 2);
}

#[tokio::test]
async fn test_unreachable_source_is_connectivity_failure() {
    let mut config = Config::default();
    config.sources.clear();
    let mut source = SourceConfig::new("Down", "http://127.0.0.1:9/", 50.0);
    source.max_retries = Some(0);
    config.sources.insert("down".to_string(), source);
    let runtime = ToolRuntime::from_config(config).unwrap();

    let result = runtime
        .fetch("down", "anything", "q", &Params::new(), ResponseFormat::Json)
        .await;

    assert!(!result.success);
    assert!(result.error.unwrap().starts_with("Failed to connect to API"));
}
