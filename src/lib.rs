//! MedAgent - Resilient access layer for biomedical research APIs
//!
//! Every call to an external API goes through one shared execution envelope
//! that applies, in order:
//!
//! - **Cache**: identical calls within the TTL are served locally
//! - **Rate limiting**: per-source token buckets, waiting rather than failing
//! - **Retry**: exponential backoff with jitter for transient failures
//! - **Uniform results**: a `StandardResult` with metadata, never an error
//!
//! Adapters only build requests and normalize responses.

pub mod access;
pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod tools;

// Re-export commonly used types
pub use errors::{ErrorKind, Result, ToolError};
pub use tools::{StandardResult, ToolExecutionEnvelope, ToolRuntime};
