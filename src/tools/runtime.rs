//! Tool runtime coordinator
//!
//! Builds one shared envelope, rate limiter and cache from the configuration
//! and hands out adapters for the registered sources.

use crate::access::{RateLimiter, ResultCache};
use crate::config::Config;
use crate::errors::{Result, ToolError};
use crate::tools::envelope::ToolExecutionEnvelope;
use crate::tools::http::HttpFetcher;
use crate::tools::implementations::{ResponseFormat, RestAdapter};
use crate::tools::registry::ToolRegistry;
use crate::tools::types::{Params, ResultMetadata, StandardResult};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Tool runtime coordinator
pub struct ToolRuntime {
    config: Config,
    registry: ToolRegistry,
    envelope: Arc<ToolExecutionEnvelope>,
    /// One client per distinct timeout so connection pools are shared
    fetchers: HashMap<Duration, Arc<HttpFetcher>>,
}

impl ToolRuntime {
    /// Create runtime from validated configuration
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let cache = ResultCache::with_enabled(config.cache_ttl(), config.cache.enabled);
        let limiter = RateLimiter::with_poll_interval(config.poll_interval());
        let envelope = ToolExecutionEnvelope::new(Arc::new(limiter), Arc::new(cache));

        let mut fetchers = HashMap::new();
        for name in config.sources.keys() {
            let timeout = config.timeout_for(name)?;
            if !fetchers.contains_key(&timeout) {
                fetchers.insert(timeout, Arc::new(HttpFetcher::new(timeout)?));
            }
        }

        Ok(Self {
            registry: ToolRegistry::from_config(&config),
            config,
            envelope: Arc::new(envelope),
            fetchers,
        })
    }

    /// Adapter for a configured source
    pub fn adapter(&self, source: &str, format: ResponseFormat) -> Result<RestAdapter> {
        let schema = self
            .registry
            .get(source)
            .ok_or_else(|| ToolError::InvalidRequest(format!("Unknown source: {}", source)))?;

        let timeout = self.config.timeout_for(source)?;
        let fetcher = self
            .fetchers
            .get(&timeout)
            .cloned()
            .ok_or_else(|| ToolError::Config(format!("No HTTP client for source: {}", source)))?;

        let settings = self.config.adapter_settings(source)?;
        Ok(RestAdapter::new(settings, schema.base_url.clone(), fetcher).with_format(format))
    }

    /// Fetch `endpoint` from `source` through the shared envelope.
    ///
    /// Never fails: unknown sources come back as a failed result.
    pub async fn fetch(
        &self,
        source: &str,
        endpoint: &str,
        query: &str,
        params: &Params,
        format: ResponseFormat,
    ) -> StandardResult {
        match self.adapter(source, format) {
            Ok(adapter) => {
                self.envelope
                    .call_adapter(&adapter, endpoint, query, params)
                    .await
            }
            Err(e) => {
                tracing::error!(
                    tool = %source,
                    operation = %endpoint,
                    error = %e,
                    "tool call rejected"
                );
                StandardResult::failure(
                    e.user_message(),
                    ResultMetadata::new(source, endpoint, query, Duration::ZERO),
                )
            }
        }
    }

    pub fn envelope(&self) -> &Arc<ToolExecutionEnvelope> {
        &self.envelope
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.registry.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::adapter::ToolAdapter;

    #[test]
    fn test_runtime_creation() {
        let runtime = ToolRuntime::from_config(Config::default()).unwrap();
        assert_eq!(runtime.tool_names().len(), 3);
        assert!(runtime.has_tool("pubmed"));
        assert!(!runtime.has_tool("scopus"));
        assert!(runtime.envelope().cache().is_enabled());
    }

    #[test]
    fn test_runtime_rejects_invalid_config() {
        let mut config = Config::default();
        config.http.timeout_secs = 0;
        assert!(ToolRuntime::from_config(config).is_err());
    }

    #[test]
    fn test_adapter_uses_source_settings() {
        let mut config = Config::default();
        config.sources.get_mut("chembl").unwrap().max_retries = Some(1);
        config.sources.get_mut("chembl").unwrap().timeout_secs = Some(5);
        let runtime = ToolRuntime::from_config(config).unwrap();

        let adapter = runtime.adapter("chembl", ResponseFormat::Json).unwrap();
        assert_eq!(adapter.base_url(), "https://www.ebi.ac.uk/chembl/api/data/");
        assert_eq!(adapter.settings().rate_per_second, 10.0);
        assert_eq!(adapter.settings().retry.max_retries(), 1);
        assert_eq!(runtime.fetchers.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_source_is_failed_result() {
        let runtime = ToolRuntime::from_config(Config::default()).unwrap();

        let result = runtime
            .fetch("scopus", "search", "q", &Params::new(), ResponseFormat::Json)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Unknown source: scopus"));
        assert_eq!(result.metadata.tool, "scopus");
        assert!(!result.metadata.cached);
    }
}
