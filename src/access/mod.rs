//! Shared access primitives
//!
//! Process-wide state every tool call passes through:
//! - Token bucket rate limiter (per-key buckets)
//! - Retry executor (exponential backoff with jitter)
//! - Result cache (TTL, lazy expiry)

pub mod cache;
pub mod rate_limiter;
pub mod retry;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use rate_limiter::{RateLimiter, TokenBucket};
pub use retry::RetryExecutor;
