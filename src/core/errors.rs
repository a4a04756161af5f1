//! Error types for the scanner111 library.
//!
//! This module provides structured error handling for all scanner operations,
//! preserving context so failures can be surfaced in reports instead of
//! tearing down a whole batch. Expected failures (missing files, malformed
//! configs, denied access) travel as data through issue lists and failed
//! analyzer results; only invariant violations remain as panics.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main result type for scanner operations.
pub type Result<T> = std::result::Result<T, ScannerError>;

/// Comprehensive error type for all scanner operations.
#[derive(Error, Debug)]
pub enum ScannerError {
    /// I/O related errors (file operations, mmap, directory walks)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Invalid caller-supplied input (null/empty paths, bad options)
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Error description
        message: String,
    },

    /// A required path or file does not exist
    #[error("not found: {path}")]
    NotFound {
        /// The missing path
        path: String,
    },

    /// Filesystem permission failures surfaced by validation probes
    #[error("access denied: {path}")]
    AccessDenied {
        /// Path the probe failed on
        path: String,
    },

    /// Malformed content in a crash log, INI, TOML, or archive header
    #[error("parse error in {source_name}: {message}")]
    Parse {
        /// File or format being parsed
        source_name: String,
        /// Error description
        message: String,
    },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// An operation exceeded its deadline
    #[error("timed out after {elapsed:?}")]
    Timeout {
        /// How long the operation ran before expiring
        elapsed: Duration,
    },

    /// Cooperative cancellation observed
    #[error("operation cancelled")]
    Cancelled,

    /// A circuit breaker rejected the call without invoking the operation
    #[error("circuit breaker open: {name}")]
    CircuitOpen {
        /// Breaker identity
        name: String,
    },

    /// Analysis pipeline errors
    #[error("pipeline error at stage '{stage}': {message}")]
    Pipeline {
        /// Pipeline stage where the error occurred
        stage: String,
        /// Error description
        message: String,
    },

    /// Analyzer-level failure kept isolated from the rest of the request
    #[error("analyzer '{analyzer}' failed: {message}")]
    Analyzer {
        /// Analyzer name
        analyzer: String,
        /// Error description
        message: String,
    },

    /// Concurrency and coordination errors (disposed processors, poisoned
    /// coordination state)
    #[error("concurrency error: {message}")]
    Concurrency {
        /// Error description
        message: String,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors — logic bugs surfaced as data
    #[error("internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl ScannerError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new invalid-input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new access-denied error
    pub fn access_denied(path: impl Into<String>) -> Self {
        Self::AccessDenied { path: path.into() }
    }

    /// Create a new parse error
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new timeout error
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Create a new pipeline error
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a new analyzer error
    pub fn analyzer(analyzer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Analyzer {
            analyzer: analyzer.into(),
            message: message.into(),
        }
    }

    /// Create a new concurrency error
    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::Concurrency {
            message: message.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// True if this error represents cooperative cancellation. Cancellation
    /// is propagated, never retried and never converted to a report issue.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// True if retrying the operation could plausibly succeed. Used as the
    /// default retry predicate.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Timeout { .. } => true,
            Self::Cancelled
            | Self::InvalidInput { .. }
            | Self::NotFound { .. }
            | Self::AccessDenied { .. }
            | Self::Parse { .. }
            | Self::Config { .. }
            | Self::CircuitOpen { .. }
            | Self::Pipeline { .. }
            | Self::Analyzer { .. }
            | Self::Concurrency { .. }
            | Self::Serialization { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }
}

impl From<io::Error> for ScannerError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            io::ErrorKind::PermissionDenied => Self::access_denied(err.to_string()),
            _ => Self::io("I/O operation failed", err),
        }
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}

impl From<toml::de::Error> for ScannerError {
    fn from(err: toml::de::Error) -> Self {
        Self::parse("TOML", err.to_string())
    }
}

/// Result extension trait for adding context to errors
pub trait ScannerResultExt<T> {
    /// Add lazily-computed context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ScannerResultExt<T> for std::result::Result<T, E>
where
    E: Into<ScannerError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_creation() {
        let err = ScannerError::config("bad option");
        assert!(matches!(err, ScannerError::Config { .. }));

        let err = ScannerError::parse("Buffout4.toml", "unexpected token");
        assert!(matches!(err, ScannerError::Parse { .. }));
    }

    #[test]
    fn io_not_found_maps_to_not_found_kind() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "missing");
        let err: ScannerError = io_err.into();
        assert!(matches!(err, ScannerError::NotFound { .. }));
    }

    #[test]
    fn cancellation_is_not_transient() {
        assert!(!ScannerError::Cancelled.is_transient());
        assert!(ScannerError::Cancelled.is_cancelled());
        assert!(ScannerError::timeout(Duration::from_secs(1)).is_transient());
    }

    #[test]
    fn internal_error_context() {
        let err = ScannerError::internal("state desync").with_context("during compose");
        if let ScannerError::Internal { context, .. } = err {
            assert_eq!(context.as_deref(), Some("during compose"));
        } else {
            panic!("expected Internal error");
        }
    }
}
