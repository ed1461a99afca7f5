//! HTTP transport for adapters
//!
//! One attempt per call; retrying is the envelope's job. Every attempt
//! carries the client-level timeout, and non-success statuses come back as
//! `ToolError::Status` so the retry executor can classify them.

use crate::errors::{Result, ToolError};
use crate::tools::types::{Params, RawResponse};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Default per-attempt timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent sent with every request
pub const USER_AGENT: &str = concat!("medagent/", env!("CARGO_PKG_VERSION"));

/// Thin reqwest wrapper with a fixed per-attempt timeout
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// GET `url` with the given query string
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Result<RawResponse> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(
                        url,
                        status = status.as_u16(),
                        error = %e,
                        "failed to read error body"
                    );
                    String::new()
                }
            };
            return Err(ToolError::status(status.as_u16(), &body));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| self.classify(e))?;

        Ok(RawResponse::new(status.as_u16(), content_type, body))
    }

    fn classify(&self, err: reqwest::Error) -> ToolError {
        if err.is_timeout() {
            ToolError::Timeout {
                duration_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ToolError::from(err)
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Flatten call parameters into query-string pairs.
///
/// Arrays become comma-separated lists (`id=1,2,3`), nulls are dropped and
/// nested objects are sent as JSON.
pub fn query_pairs(params: &Params) -> Vec<(String, String)> {
    params
        .iter()
        .filter_map(|(name, value)| {
            let rendered = match value {
                Value::Null => return None,
                Value::Array(items) => items
                    .iter()
                    .map(scalar_to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                other => scalar_to_string(other),
            };
            Some((name.clone(), rendered))
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fetcher_creation() {
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        assert_eq!(fetcher.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_query_pairs() {
        let mut params = Params::new();
        params.insert("term".into(), json!("EGFR inhibitors"));
        params.insert("retmax".into(), json!(10));
        params.insert("id".into(), json!(["123", "456"]));
        params.insert("mindate".into(), Value::Null);
        params.insert("strict".into(), json!(true));

        let mut pairs = query_pairs(&params);
        pairs.sort();

        assert_eq!(
            pairs,
            vec![
                ("id".to_string(), "123,456".to_string()),
                ("retmax".to_string(), "10".to_string()),
                ("strict".to_string(), "true".to_string()),
                ("term".to_string(), "EGFR inhibitors".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_truncated_error_body_keeps_status() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            // promises more body than it sends, then hangs up
            let _ = socket
                .write_all(b"HTTP/1.1 503 Unavailable\r\nContent-Length: 100\r\n\r\nshort")
                .await;
            let _ = socket.shutdown().await;
        });

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher
            .get(&format!("http://{}/esearch.fcgi", addr), &[])
            .await
            .unwrap_err();

        match err {
            ToolError::Status { status, message } => {
                assert_eq!(status, 503);
                assert!(message.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        // port 9 (discard) is almost never listening on loopback
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();
        let err = fetcher.get("http://127.0.0.1:9/", &[]).await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {:?}", err);
    }
}
