//! Adapter contract
//!
//! An adapter knows how to talk to one API: it builds and sends the request
//! and normalizes the raw response. Throttling, retries, caching and result
//! construction belong to the envelope, never to the adapter.

use crate::access::RetryExecutor;
use crate::errors::Result;
use crate::tools::types::{Params, RawResponse};
use async_trait::async_trait;
use serde_json::Value;

/// Rate and retry policy an adapter declares to the envelope
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Tool name reported in metadata and logs
    pub name: String,

    /// Cache key namespace; adapters that normalize differently need distinct scopes
    pub cache_scope: String,

    /// Token bucket key; adapters sharing a key share a budget
    pub rate_limit_key: String,

    /// Requests per second
    pub rate_per_second: f64,

    /// Burst capacity, defaults to `rate_per_second`
    pub burst: Option<f64>,

    /// Retry policy for network attempts
    pub retry: RetryExecutor,
}

impl AdapterSettings {
    /// Settings keyed by the tool name with the default retry policy
    pub fn new(name: impl Into<String>, rate_per_second: f64) -> Self {
        let name = name.into();
        Self {
            rate_limit_key: name.clone(),
            cache_scope: name.clone(),
            name,
            rate_per_second,
            burst: None,
            retry: RetryExecutor::new(),
        }
    }

    pub fn with_rate_limit_key(mut self, key: impl Into<String>) -> Self {
        self.rate_limit_key = key.into();
        self
    }

    pub fn with_cache_scope(mut self, scope: impl Into<String>) -> Self {
        self.cache_scope = scope.into();
        self
    }

    pub fn with_burst(mut self, burst: f64) -> Self {
        self.burst = Some(burst);
        self
    }

    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }
}

/// API-specific request building and response parsing
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Declared rate and retry policy
    fn settings(&self) -> &AdapterSettings;

    fn name(&self) -> &str {
        &self.settings().name
    }

    /// Perform one network attempt for `operation`
    async fn send_request(&self, operation: &str, params: &Params) -> Result<RawResponse>;

    /// Normalize a raw response into a list or object
    fn parse_response(&self, operation: &str, raw: RawResponse) -> Result<Value>;
}
