//! Generic REST adapter
//!
//! Operations are endpoint paths relative to the source's base URL and
//! parameters become the query string. Normalization is deliberately shallow:
//! decode JSON and optionally select a sub-document by JSON pointer, or hand
//! back the body as text (for XML endpoints such as PubMed `efetch`).

use crate::errors::{Result, ToolError};
use crate::tools::adapter::{AdapterSettings, ToolAdapter};
use crate::tools::http::{query_pairs, HttpFetcher};
use crate::tools::types::{Params, RawResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// How a response body becomes the normalized value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// Decode JSON as-is
    #[default]
    Json,
    /// Decode JSON and select the value at an RFC 6901 pointer
    JsonPointer(String),
    /// Body as a JSON string
    Text,
}

/// Adapter for a plain GET-with-query-string API
#[derive(Debug, Clone)]
pub struct RestAdapter {
    settings: AdapterSettings,
    base_url: String,
    fetcher: Arc<HttpFetcher>,
    format: ResponseFormat,
}

impl RestAdapter {
    pub fn new(
        settings: AdapterSettings,
        base_url: impl Into<String>,
        fetcher: Arc<HttpFetcher>,
    ) -> Self {
        Self {
            settings,
            base_url: base_url.into(),
            fetcher,
            format: ResponseFormat::default(),
        }
    }

    /// Change normalization; the cache scope follows so results never mix
    pub fn with_format(mut self, format: ResponseFormat) -> Self {
        self.settings.cache_scope = match &format {
            ResponseFormat::Json => self.settings.name.clone(),
            ResponseFormat::JsonPointer(pointer) => format!("{}#json{}", self.settings.name, pointer),
            ResponseFormat::Text => format!("{}#text", self.settings.name),
        };
        self.format = format;
        self
    }

    /// Absolute URL for an endpoint
    pub fn endpoint_url(&self, endpoint: &str) -> Result<String> {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ToolError::InvalidRequest("endpoint must not be empty".into()));
        }
        if endpoint.contains("://") {
            return Err(ToolError::InvalidRequest(format!(
                "endpoint '{}' must be relative to {}",
                endpoint, self.base_url
            )));
        }

        Ok(format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        ))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn format(&self) -> &ResponseFormat {
        &self.format
    }
}

#[async_trait]
impl ToolAdapter for RestAdapter {
    fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    async fn send_request(&self, operation: &str, params: &Params) -> Result<RawResponse> {
        let url = self.endpoint_url(operation)?;
        self.fetcher.get(&url, &query_pairs(params)).await
    }

    fn parse_response(&self, _operation: &str, raw: RawResponse) -> Result<Value> {
        match &self.format {
            ResponseFormat::Json => raw.json(),
            ResponseFormat::JsonPointer(pointer) => {
                let document: Value = raw.json()?;
                document.pointer(pointer).cloned().ok_or_else(|| {
                    ToolError::Parse(format!("response has no value at '{}'", pointer))
                })
            }
            ResponseFormat::Text => Ok(Value::String(raw.text()?.to_string())),
        }
    }
}
