//! Error types for the MedAgent access layer
//!
//! Every failure a tool call can hit is a `ToolError`. Each error maps onto a
//! small, fixed `ErrorKind` taxonomy which drives retry decisions and the
//! human-readable message placed into a failed `StandardResult`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// HTTP status codes worth another attempt
pub const RETRYABLE_STATUS_CODES: [u16; 5] = [
    429, // Too Many Requests
    500, // Internal Server Error
    502, // Bad Gateway
    503, // Service Unavailable
    504, // Gateway Timeout
];

/// HTTP status codes that fail immediately
pub const NON_RETRYABLE_STATUS_CODES: [u16; 6] = [
    400, // Bad Request
    401, // Unauthorized
    403, // Forbidden
    404, // Not Found
    405, // Method Not Allowed
    422, // Unprocessable Entity
];

/// Main error type for tool calls
#[derive(Error, Debug)]
pub enum ToolError {
    /// No route, refused connection, reset mid-request
    #[error("Connection failed: {0}")]
    Connectivity(String),

    /// Attempt exceeded its deadline
    #[error("Request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Payload could not be normalized
    #[error("Response parse error: {0}")]
    Parse(String),

    /// Caller supplied something unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for access-layer operations
pub type Result<T> = std::result::Result<T, ToolError>;

/// Failure classification shared by the retry executor and the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    ConnectivityFailure,
    TimeoutFailure,
    ThrottledOrServerFailure,
    ClientRequestFailure,
    ResponseParseFailure,
    UnclassifiedFailure,
}

impl ErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        if RETRYABLE_STATUS_CODES.contains(&status) {
            ErrorKind::ThrottledOrServerFailure
        } else if NON_RETRYABLE_STATUS_CODES.contains(&status) {
            ErrorKind::ClientRequestFailure
        } else {
            ErrorKind::UnclassifiedFailure
        }
    }

    /// Whether a failure of this kind may succeed on another attempt
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectivityFailure
                | ErrorKind::TimeoutFailure
                | ErrorKind::ThrottledOrServerFailure
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ConnectivityFailure => "connectivity",
            ErrorKind::TimeoutFailure => "timeout",
            ErrorKind::ThrottledOrServerFailure => "throttled_or_server",
            ErrorKind::ClientRequestFailure => "client_request",
            ErrorKind::ResponseParseFailure => "response_parse",
            ErrorKind::UnclassifiedFailure => "unclassified",
        };
        f.write_str(name)
    }
}

impl ToolError {
    /// Build a status error, keeping at most a short prefix of the body
    pub fn status(status: u16, body: &str) -> Self {
        let message: String = body.trim().chars().take(200).collect();
        ToolError::Status { status, message }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Connectivity(_) => ErrorKind::ConnectivityFailure,
            ToolError::Timeout { .. } => ErrorKind::TimeoutFailure,
            ToolError::Status { status, .. } => ErrorKind::from_status(*status),
            ToolError::Parse(_) => ErrorKind::ResponseParseFailure,
            ToolError::InvalidRequest(_) => ErrorKind::ClientRequestFailure,
            ToolError::Config(_) | ToolError::Io(_) | ToolError::Generic(_) => {
                ErrorKind::UnclassifiedFailure
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Message surfaced to callers through `StandardResult.error`
    pub fn user_message(&self) -> String {
        match self {
            ToolError::Connectivity(_) => {
                "Failed to connect to API. Please check your internet connection.".to_string()
            }
            ToolError::Timeout { .. } => "API request timed out. Please try again.".to_string(),
            ToolError::Status { .. } => format!("API returned an error: {}", self),
            ToolError::Parse(detail) => format!(
                "Failed to parse API response. The API may be experiencing issues. ({})",
                detail
            ),
            ToolError::InvalidRequest(detail) => format!("Invalid input: {}", detail),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured deadline back
            ToolError::Timeout { duration_ms: 0 }
        } else if err.is_connect() {
            ToolError::Connectivity(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ToolError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ToolError::status(status.as_u16(), &err.to_string())
        } else if err.is_builder() {
            ToolError::InvalidRequest(err.to_string())
        } else {
            ToolError::Generic(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        ToolError::Parse(err.to_string())
    }
}
