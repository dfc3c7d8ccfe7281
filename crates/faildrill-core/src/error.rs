use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Canonical error type for load test setup, configuration and export.
///
/// Per-attempt write failures are not represented here: they are data,
/// recorded as failed [`WriteAttempt`](crate::WriteAttempt)s.
#[derive(Debug, Error)]
pub enum LoadTestError {
    /// Run could not be prepared (store unreachable, bad connection settings).
    #[error("setup failed: {message}")]
    Setup {
        /// Human-readable reason the setup step failed.
        message: String,
    },

    /// The reference key pool is empty, so no valid synthetic record can be built.
    #[error("no reference keys found; seed the reference table before running")]
    NoReferenceKeys,

    /// Run configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration file could not be parsed.
    #[error("failed to parse config file {path}: {source}")]
    Toml {
        /// Path of the offending file.
        path: PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// I/O error occurred while reading or writing result files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A row of an exported results file could not be read back.
    #[error("invalid record: {message}")]
    InvalidRecord {
        /// Which field was rejected and why.
        message: String,
    },
}

impl LoadTestError {
    /// Creates a `Setup` variant.
    #[must_use]
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup {
            message: message.into(),
        }
    }

    /// Creates an `InvalidRecord` variant.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Returns true for errors that abort a run before any worker starts.
    #[must_use]
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::Setup { .. } | Self::NoReferenceKeys | Self::InvalidConfig(_) | Self::Toml { .. }
        )
    }
}

/// Convenient result alias for load test operations.
pub type LoadTestResult<T> = Result<T, LoadTestError>;

/// Failure of a single write against the target store.
///
/// The `Display` output becomes the error text of the recorded attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    /// The write did not complete within the per-operation timeout.
    #[error("write timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// No session could be opened (refused, reset, pool acquire timeout).
    #[error("connection error: {0}")]
    Connection(String),

    /// The store rejected the statement or the commit.
    #[error("database error: {0}")]
    Database(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_errors_are_classified() {
        assert!(LoadTestError::NoReferenceKeys.is_setup());
        assert!(LoadTestError::setup("db down").is_setup());
        assert!(LoadTestError::InvalidConfig("x".into()).is_setup());
        assert!(!LoadTestError::invalid_record("bad row").is_setup());
    }

    #[test]
    fn write_error_text() {
        let err = WriteError::Timeout(Duration::from_millis(5000));
        assert_eq!(err.to_string(), "write timed out after 5000ms");

        let err = WriteError::Database("read-only transaction".into());
        assert_eq!(err.to_string(), "database error: read-only transaction");
    }
}
