//! Run configuration for a failover load test.
//!
//! Supports multiple configuration sources with precedence:
//! 1. Command-line flags and their environment fallbacks (highest priority)
//! 2. TOML configuration file
//! 3. Default values (lowest priority)
//!
//! The command-line layer lives in the binary; this module owns the file
//! format, the defaults and validation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LoadTestError, LoadTestResult};

/// Parameters of one run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of concurrent writers (default: 10)
    pub workers: usize,

    /// Target aggregate write rate across all workers (default: 50)
    pub writes_per_second: f64,

    /// How long the run lasts unless interrupted, in seconds (default: 300)
    pub duration_secs: u64,

    /// Failover must be strictly shorter than this to pass, in seconds (default: 120)
    pub sla_threshold_secs: u64,

    /// Interval between progress lines, in seconds (default: 5)
    pub report_interval_secs: u64,

    /// Number of recent attempts used for the rolling success rate (default: 50)
    pub recent_window: usize,

    /// Per-write timeout in milliseconds (default: 5000)
    pub write_timeout_ms: u64,

    /// Directory receiving the CSV export and optional reports (default: ".")
    pub output_dir: PathBuf,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            writes_per_second: 50.0,
            duration_secs: 300,
            sla_threshold_secs: 120,
            report_interval_secs: 5,
            recent_window: 50,
            write_timeout_ms: 5_000,
            output_dir: PathBuf::from("."),
        }
    }
}

impl RunConfig {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> LoadTestResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|source| LoadTestError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LoadTestResult<()> {
        if self.workers > 0 && !(self.writes_per_second.is_finite() && self.writes_per_second > 0.0)
        {
            return Err(LoadTestError::InvalidConfig(
                "writes_per_second must be > 0 when workers are configured".to_string(),
            ));
        }
        self.per_worker_delay()?;

        if self.duration_secs == 0 {
            return Err(LoadTestError::InvalidConfig(
                "duration_secs must be > 0".to_string(),
            ));
        }

        if self.sla_threshold_secs == 0 {
            return Err(LoadTestError::InvalidConfig(
                "sla_threshold_secs must be > 0".to_string(),
            ));
        }

        if self.report_interval_secs == 0 {
            return Err(LoadTestError::InvalidConfig(
                "report_interval_secs must be > 0".to_string(),
            ));
        }

        if self.recent_window == 0 {
            return Err(LoadTestError::InvalidConfig(
                "recent_window must be > 0".to_string(),
            ));
        }

        if self.write_timeout_ms == 0 {
            return Err(LoadTestError::InvalidConfig(
                "write_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Delay each worker waits between its own attempts: `workers / writes_per_second`.
    ///
    /// Fails when the delay does not fit in a [`Duration`] (a rate too small
    /// for the worker count).
    pub fn per_worker_delay(&self) -> LoadTestResult<Duration> {
        if self.workers == 0 {
            return Ok(Duration::ZERO);
        }
        Duration::try_from_secs_f64(self.workers as f64 / self.writes_per_second).map_err(|_| {
            LoadTestError::InvalidConfig(format!(
                "writes_per_second {} is too low for {} workers",
                self.writes_per_second, self.workers
            ))
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn sla_threshold(&self) -> Duration {
        Duration::from_secs(self.sla_threshold_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}
