use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::WriteError;

/// Outcome of one write operation issued by a worker.
///
/// Immutable once built. `error` is present iff the attempt failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteAttempt {
    timestamp: DateTime<Utc>,
    success: bool,
    duration: Duration,
    error: Option<String>,
}

impl WriteAttempt {
    /// A successful attempt completed at `timestamp`.
    #[must_use]
    pub fn succeeded(timestamp: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            timestamp,
            success: true,
            duration,
            error: None,
        }
    }

    /// A failed attempt completed at `timestamp` with a human-readable error.
    #[must_use]
    pub fn failed(timestamp: DateTime<Utc>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            success: false,
            duration,
            error: Some(error.into()),
        }
    }

    /// Builds an attempt from the result of a store write.
    #[must_use]
    pub fn from_result(
        timestamp: DateTime<Utc>,
        duration: Duration,
        result: Result<(), WriteError>,
    ) -> Self {
        match result {
            Ok(()) => Self::succeeded(timestamp, duration),
            Err(err) => Self::failed(timestamp, duration, err.to_string()),
        }
    }

    /// Wall-clock completion time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn success(&self) -> bool {
        self.success
    }

    /// Elapsed time of the write call.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Elapsed time in fractional milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
