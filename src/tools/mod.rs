//! Tool access layer
//!
//! Adapters for external APIs and the envelope that wraps every call with
//! caching, rate limiting, retries and uniform result construction.

pub mod adapter;
pub mod envelope;
pub mod http;
pub mod implementations;
pub mod registry;
pub mod runtime;
pub mod types;

// Re-export commonly used types
pub use adapter::{AdapterSettings, ToolAdapter};
pub use envelope::ToolExecutionEnvelope;
pub use http::HttpFetcher;
pub use implementations::{ResponseFormat, RestAdapter};
pub use registry::ToolRegistry;
pub use runtime::ToolRuntime;
pub use types::{Params, RawResponse, ResultMetadata, StandardResult, ToolSchema, ToolStats};
