//! Token bucket rate limiter
//!
//! Buckets are keyed by string and created lazily on first use. Refill is
//! computed at acquisition time (`min(capacity, tokens + elapsed * rate)`);
//! there is no background ticker. A caller that finds too few tokens sleeps a
//! fixed poll interval and tries again.

use crate::errors::{Result, ToolError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Delay between acquisition attempts on an exhausted bucket
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Single token bucket
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Refill rate (tokens per second)
    rate: f64,

    /// Maximum tokens
    capacity: f64,

    /// Current token count
    tokens: f64,

    /// Last refill time
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket. Capacity defaults to the rate (one second of burst).
    pub fn new(rate: f64, capacity: Option<f64>) -> Self {
        let capacity = capacity.unwrap_or(rate);
        Self {
            rate,
            capacity,
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn refill_at(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }

    fn try_consume_at(&mut self, now: Instant, tokens: f64) -> bool {
        self.refill_at(now);
        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// Refill, then debit `tokens` if enough are present
    pub fn try_consume(&mut self, tokens: f64) -> bool {
        self.try_consume_at(Instant::now(), tokens)
    }

    /// How long until `tokens` would be available, assuming no other consumers
    pub fn time_until_available(&self, tokens: f64) -> Duration {
        if self.tokens >= tokens {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((tokens - self.tokens) / self.rate)
        }
    }

    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

/// Named set of token buckets shared by every adapter in the process
#[derive(Debug)]
pub struct RateLimiter {
    /// Map lock only guards lookup/insert; each bucket has its own lock
    buckets: Mutex<HashMap<String, Arc<Mutex<TokenBucket>>>>,

    poll_interval: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_poll_interval(DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            poll_interval,
        }
    }

    /// Block until `tokens` are available under `key`, then debit them.
    ///
    /// Capacity defaults to `rate`.
    pub async fn acquire(&self, key: &str, rate: f64, tokens: u32) -> Result<()> {
        self.acquire_with_capacity(key, rate, None, tokens).await
    }

    /// Same as [`acquire`](Self::acquire) with an explicit burst capacity.
    ///
    /// Rate and capacity only apply when the bucket is first created; later
    /// callers share whatever the first caller configured.
    pub async fn acquire_with_capacity(
        &self,
        key: &str,
        rate: f64,
        capacity: Option<f64>,
        tokens: u32,
    ) -> Result<()> {
        let bucket = self.bucket(key, rate, capacity)?;
        let wanted = f64::from(tokens);

        {
            let guard = bucket.lock().unwrap_or_else(PoisonError::into_inner);
            if wanted > guard.capacity {
                return Err(ToolError::InvalidRequest(format!(
                    "requested {} tokens from '{}' but capacity is {}",
                    tokens, key, guard.capacity
                )));
            }
        }

        let mut waited = false;
        loop {
            let acquired = bucket
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_consume(wanted);
            if acquired {
                return Ok(());
            }
            if !waited {
                tracing::debug!(key, tokens, "rate limit reached, waiting");
                waited = true;
            }
            sleep(self.poll_interval).await;
        }
    }

    fn bucket(
        &self,
        key: &str,
        rate: f64,
        capacity: Option<f64>,
    ) -> Result<Arc<Mutex<TokenBucket>>> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(ToolError::Config(format!(
                "rate for '{}' must be a positive number, got {}",
                key, rate
            )));
        }
        if let Some(cap) = capacity {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ToolError::Config(format!(
                    "capacity for '{}' must be a positive number, got {}",
                    key, cap
                )));
            }
        }

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::new(rate, capacity))));
        Ok(Arc::clone(bucket))
    }

    /// Current token count of a bucket, refilled to now. `None` for unknown keys.
    pub fn available_tokens(&self, key: &str) -> Option<f64> {
        let bucket = {
            let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
            buckets.get(key).cloned()
        }?;
        let mut guard = bucket.lock().unwrap_or_else(PoisonError::into_inner);
        guard.refill_at(Instant::now());
        Some(guard.tokens())
    }

    /// Number of buckets created so far
    pub fn bucket_count(&self) -> usize {
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(3.0, None);
        assert_eq!(bucket.capacity(), 3.0);
        assert_eq!(bucket.tokens(), 3.0);

        let bucket = TokenBucket::new(3.0, Some(10.0));
        assert_eq!(bucket.capacity(), 10.0);
        assert_eq!(bucket.tokens(), 10.0);
    }

    #[test]
    fn test_bucket_refill_is_capped() {
        let mut bucket = TokenBucket::new(2.0, None);
        let start = bucket.last_refill;

        assert!(bucket.try_consume_at(start, 2.0));
        assert!(!bucket.try_consume_at(start, 1.0));

        // half a second at 2 tokens/s buys one token
        assert!(bucket.try_consume_at(start + Duration::from_millis(500), 1.0));
        assert!(!bucket.try_consume_at(start + Duration::from_millis(500), 1.0));

        bucket.refill_at(start + Duration::from_secs(60));
        assert_eq!(bucket.tokens(), 2.0);
    }

    #[test]
    fn test_time_until_available() {
        let mut bucket = TokenBucket::new(4.0, None);
        let now = bucket.last_refill;
        assert_eq!(bucket.time_until_available(1.0), Duration::ZERO);

        assert!(bucket.try_consume_at(now, 4.0));
        assert_eq!(bucket.time_until_available(1.0), Duration::from_millis(250));
    }

    #[quickcheck]
    fn prop_tokens_stay_within_bounds(steps: Vec<(u16, u8)>) -> bool {
        let mut bucket = TokenBucket::new(5.0, Some(7.0));
        let mut now = bucket.last_refill;

        steps.into_iter().all(|(advance_ms, wanted)| {
            now += Duration::from_millis(u64::from(advance_ms % 2000));
            bucket.try_consume_at(now, f64::from(wanted % 8));
            bucket.tokens() >= 0.0 && bucket.tokens() <= bucket.capacity()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_burst_does_not_wait() {
        let limiter = RateLimiter::new();
        let start = Instant::now();

        for _ in 0..3 {
            assert_ok!(limiter.acquire("pubmed", 3.0, 1).await);
        }

        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(limiter.available_tokens("pubmed").unwrap() < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let limiter = RateLimiter::new();
        limiter.acquire("chembl", 2.0, 2).await.unwrap();

        let start = Instant::now();
        limiter.acquire("chembl", 2.0, 1).await.unwrap();

        // one token at 2/s needs 500ms; polling rounds up to the next tick
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500));
        assert!(waited <= Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let limiter = RateLimiter::new();
        limiter.acquire("a", 1.0, 1).await.unwrap();

        let start = Instant::now();
        limiter.acquire("b", 1.0, 1).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(limiter.bucket_count(), 2);
    }

    #[tokio::test]
    async fn test_rejects_bad_parameters() {
        let limiter = RateLimiter::new();
        assert_err!(limiter.acquire("x", -1.0, 1).await);
        assert!(matches!(
            limiter.acquire("x", 0.0, 1).await,
            Err(ToolError::Config(_))
        ));
        assert!(matches!(
            limiter.acquire("x", f64::NAN, 1).await,
            Err(ToolError::Config(_))
        ));
        assert!(matches!(
            limiter.acquire("y", 2.0, 3).await,
            Err(ToolError::InvalidRequest(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_acquire_never_over_issues() {
        let limiter = Arc::new(RateLimiter::new());
        let issued = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        let (rate, capacity, callers) = (5.0, 5.0, 20usize);

        let mut handles = vec![];
        for _ in 0..callers {
            let limiter = limiter.clone();
            let issued = issued.clone();
            handles.push(tokio::spawn(async move {
                limiter
                    .acquire_with_capacity("shared", rate, Some(capacity), 1)
                    .await
                    .unwrap();
                let granted = issued.fetch_add(1, Ordering::SeqCst) + 1;
                let allowed = capacity + start.elapsed().as_secs_f64() * rate;
                assert!(
                    granted as f64 <= allowed + 1e-9,
                    "{} tokens granted but only {} allowed",
                    granted,
                    allowed
                );
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(issued.load(Ordering::SeqCst), callers);
        // 15 tokens beyond the initial burst at 5/s
        assert!(start.elapsed() >= Duration::from_millis(2900));
    }
}
