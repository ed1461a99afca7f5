//! Tool execution envelope
//!
//! Every adapter call goes through the same sequence:
//! 1. Build a cache key from `(cache scope, operation, params)`
//! 2. Cache hit: return immediately (no rate-limit token, no network)
//! 3. Cache miss: wait on the rate limiter, then run the request under the
//!    adapter's retry policy
//! 4. Parse, store in the cache, return a successful `StandardResult`
//! 5. Any failure becomes a failed `StandardResult`; nothing is raised
//!
//! One structured log record is emitted per call.

use crate::access::{CacheKey, RateLimiter, ResultCache};
use crate::errors::{Result, ToolError};
use crate::tools::adapter::{AdapterSettings, ToolAdapter};
use crate::tools::types::{count_results, Params, ResultMetadata, StandardResult, ToolStats};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

/// Uniform call wrapper shared by every adapter in the process
#[derive(Debug)]
pub struct ToolExecutionEnvelope {
    rate_limiter: Arc<RateLimiter>,
    cache: Arc<ResultCache>,
    stats: Mutex<HashMap<String, ToolStats>>,
}

impl ToolExecutionEnvelope {
    pub fn new(rate_limiter: Arc<RateLimiter>, cache: Arc<ResultCache>) -> Self {
        Self {
            rate_limiter,
            cache,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// Run one adapter operation
    pub async fn call_adapter<A>(
        &self,
        adapter: &A,
        operation: &str,
        query: &str,
        params: &Params,
    ) -> StandardResult
    where
        A: ToolAdapter + ?Sized,
    {
        self.call(
            adapter.settings(),
            operation,
            query,
            params,
            || adapter.send_request(operation, params),
            |raw| adapter.parse_response(operation, raw),
        )
        .await
    }

    /// Run `request` then `parse` under the full cache/rate-limit/retry sequence.
    ///
    /// `request` is invoked once per network attempt.
    pub async fn call<R, F, Fut, P>(
        &self,
        settings: &AdapterSettings,
        operation: &str,
        query: &str,
        params: &Params,
        mut request: F,
        parse: P,
    ) -> StandardResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<R>>,
        P: FnOnce(R) -> Result<Value>,
    {
        let start = Instant::now();
        // the cache is shared across tools, so keys are scoped per adapter
        let key = CacheKey::new(&format!("{}/{}", settings.cache_scope, operation), params);

        if let Some(data) = self.cache.get(&key) {
            let metadata = ResultMetadata::new(&settings.name, operation, query, start.elapsed())
                .with_cached(true)
                .with_results_count(count_results(&data));
            self.record(settings, &metadata, None, 0);
            return StandardResult::success(data, metadata);
        }

        let attempts = AtomicU64::new(0);
        let outcome = async {
            self.rate_limiter
                .acquire_with_capacity(
                    &settings.rate_limit_key,
                    settings.rate_per_second,
                    settings.burst,
                    1,
                )
                .await?;

            let raw = settings
                .retry
                .execute(|| {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    request()
                })
                .await?;

            parse(raw)
        }
        .await;

        let retries = attempts.load(Ordering::Relaxed).saturating_sub(1);
        let metadata = ResultMetadata::new(&settings.name, operation, query, start.elapsed());

        match outcome {
            Ok(data) => {
                let metadata = metadata.with_results_count(count_results(&data));
                self.cache.put(key, data.clone());
                self.record(settings, &metadata, None, retries);
                StandardResult::success(data, metadata)
            }
            Err(e) => {
                let message = e.user_message();
                self.record(settings, &metadata, Some((&e, message.as_str())), retries);
                StandardResult::failure(message, metadata)
            }
        }
    }

    fn record(
        &self,
        settings: &AdapterSettings,
        metadata: &ResultMetadata,
        failure: Option<(&ToolError, &str)>,
        retries: u64,
    ) {
        {
            let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = stats.entry(settings.name.clone()).or_default();
            match failure {
                None => entry.record_success(metadata.latency_ms, metadata.cached),
                Some(_) => entry.record_failure(metadata.latency_ms),
            }
            entry.record_retries(retries);
        }

        match failure {
            None => tracing::info!(
                tool = %metadata.tool,
                operation = %metadata.operation,
                query = %metadata.query,
                latency_ms = metadata.latency_ms,
                status = "success",
                cached = metadata.cached,
                results = metadata.results_count,
                retries,
                "tool call"
            ),
            Some((err, message)) => tracing::error!(
                tool = %metadata.tool,
                operation = %metadata.operation,
                query = %metadata.query,
                latency_ms = metadata.latency_ms,
                status = "error",
                cached = false,
                kind = %err.kind(),
                error = %message,
                retries,
                "tool call"
            ),
        }
    }

    /// Statistics for one tool, if it has been called
    pub fn stats(&self, tool: &str) -> Option<ToolStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tool)
            .cloned()
    }

    /// Statistics for every tool called so far
    pub fn all_stats(&self) -> HashMap<String, ToolStats> {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}
