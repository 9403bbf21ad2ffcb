//! Error types for eventgraph.
//!
//! Library crates use [`EventGraphError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all eventgraph operations.
#[derive(Debug, thiserror::Error)]
pub enum EventGraphError {
    /// Configuration loading or validation error. Always fatal for a run.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level failure (connect error, timeout, body read).
    #[error("network error: {message}")]
    Network { message: String, timeout: bool },

    /// An external service answered with a non-success status.
    #[error("{service} returned HTTP {status}: {message}")]
    Service {
        service: String,
        status: u16,
        message: String,
    },

    /// HTML, JSON, or service payload could not be interpreted.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid date range, malformed record, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, EventGraphError>;

impl EventGraphError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a network error. `timeout` marks request timeouts.
    pub fn network(msg: impl Into<String>, timeout: bool) -> Self {
        Self::Network {
            message: msg.into(),
            timeout,
        }
    }

    /// Create a service status error.
    pub fn service(service: impl Into<String>, status: u16, msg: impl Into<String>) -> Self {
        Self::Service {
            service: service.into(),
            status,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether retrying the same request may succeed (timeouts, transport
    /// errors, 5xx and 429 responses).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Service { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
