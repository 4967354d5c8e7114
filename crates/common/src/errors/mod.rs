//! Error types for citemap
//!
//! Provides:
//! - Distinct error types for the failure modes of one run
//! - Machine-readable error codes
//! - Transient/permanent classification for external calls

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Input errors (1xxx)
    ValidationError,
    InvalidFormat,

    // External service errors (8xxx)
    UpstreamError,
    UpstreamStatus,
    UpstreamTimeout,
    RateLimited,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidFormat => 1003,

            ErrorCode::UpstreamError => 8001,
            ErrorCode::UpstreamStatus => 8002,
            ErrorCode::UpstreamTimeout => 8003,
            ErrorCode::RateLimited => 8004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // External bibliographic database errors
    #[error("{service} request failed: {message}")]
    Upstream { service: String, message: String },

    #[error("{service} returned HTTP {status}: {body}")]
    UpstreamStatus {
        service: String,
        status: u16,
        body: String,
    },

    #[error("{service} timed out after {timeout_ms}ms")]
    UpstreamTimeout { service: String, timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Upstream { .. } | AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::UpstreamStatus { status: 429, .. } => ErrorCode::RateLimited,
            AppError::UpstreamStatus { .. } => ErrorCode::UpstreamStatus,
            AppError::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            AppError::Internal { .. } | AppError::Other(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Transport failures, timeouts, 429 and 5xx are transient. Other 4xx
    /// answers and malformed payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Upstream { .. } | AppError::UpstreamTimeout { .. } => true,
            AppError::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Whether this error came from the external database at all
    pub fn is_upstream(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::UpstreamError
                | ErrorCode::UpstreamStatus
                | ErrorCode::UpstreamTimeout
                | ErrorCode::RateLimited
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
