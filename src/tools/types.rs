//! Tool call types
//!
//! `StandardResult` is the only thing a tool call ever hands back: callers
//! branch on `success` and read `data`, `error` and `metadata`.

use crate::errors::{Result, ToolError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Adapter-specific call parameters
pub type Params = serde_json::Map<String, Value>;

/// Uniform outcome of one tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardResult<T = Value> {
    /// Whether the call produced data
    pub success: bool,

    /// Normalized data, present on success
    pub data: Option<T>,

    /// Human-readable failure message, present on failure
    pub error: Option<String>,

    /// Always populated, whatever the outcome
    pub metadata: ResultMetadata,
}

impl<T> StandardResult<T> {
    /// Create successful result
    pub fn success(data: T, metadata: ResultMetadata) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata,
        }
    }

    /// Create failed result
    pub fn failure(error: impl Into<String>, metadata: ResultMetadata) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata,
        }
    }
}

/// Timing and outcome details captured for every call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Caller-supplied query label, echoed back
    pub query: String,

    /// When the result was produced (UTC)
    pub timestamp: DateTime<Utc>,

    /// Tool (source) name
    pub tool: String,

    /// Operation the call performed
    pub operation: String,

    /// Wall time from cache lookup to result, in milliseconds
    pub latency_ms: u64,

    /// Served from the result cache
    pub cached: bool,

    /// Number of records in `data` (list length, 1 for objects, 0 on failure)
    pub results_count: usize,
}

impl ResultMetadata {
    pub fn new(
        tool: impl Into<String>,
        operation: impl Into<String>,
        query: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            query: query.into(),
            timestamp: Utc::now(),
            tool: tool.into(),
            operation: operation.into(),
            latency_ms: u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            cached: false,
            results_count: 0,
        }
    }

    pub fn with_cached(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    pub fn with_results_count(mut self, count: usize) -> Self {
        self.results_count = count;
        self
    }
}

/// Record count of a normalized value: list length, otherwise one
pub fn count_results(data: &Value) -> usize {
    match data {
        Value::Array(items) => items.len(),
        _ => 1,
    }
}

/// Undecoded response handed from an adapter's request step to its parser
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type,
            body: body.into(),
        }
    }

    /// Body as UTF-8 text
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body)
            .map_err(|e| ToolError::Parse(format!("response is not valid UTF-8: {}", e)))
    }

    /// Body decoded as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.contains("json"))
            .unwrap_or(false)
    }
}

/// Description of a configured source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Source name used on the command line and in logs
    pub name: String,

    /// Human-facing name
    pub description: String,

    /// API base URL
    pub base_url: String,

    /// Bucket shared by every call to this source
    pub rate_limit_key: String,

    /// Requests per second
    pub rate_per_second: f64,
}

/// Per-envelope call statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolStats {
    /// Total calls
    pub total_calls: u64,

    /// Calls that returned data
    pub successful_calls: u64,

    /// Calls that returned an error
    pub failed_calls: u64,

    /// Calls served from the cache
    pub cache_hits: u64,

    /// Network retries across all calls
    pub retry_attempts: u64,

    /// Total latency (ms)
    pub total_latency_ms: u64,
}

impl ToolStats {
    /// Record successful call
    pub fn record_success(&mut self, latency_ms: u64, cached: bool) {
        self.total_calls += 1;
        self.successful_calls += 1;
        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
        if cached {
            self.cache_hits += 1;
        }
    }

    /// Record failed call
    pub fn record_failure(&mut self, latency_ms: u64) {
        self.total_calls += 1;
        self.failed_calls += 1;
        self.total_latency_ms = self.total_latency_ms.saturating_add(latency_ms);
    }

    /// Record retry attempts made by one call
    pub fn record_retries(&mut self, retries: u64) {
        self.retry_attempts = self.retry_attempts.saturating_add(retries);
    }

    /// Calculate average latency
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_calls as f64
        }
    }

    /// Calculate success rate
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }

    pub fn cache_hit_rate(&self) -> f64 {
        if self.total_calls == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.total_calls as f64
        }
    }
}
