//! Core of the faildrill failover load tester.
//!
//! A run drives concurrent writers against a [`WriteSink`], records every
//! attempt in a shared [`MetricsRecorder`], and turns the final log into a
//! [`FailoverSummary`] with an SLA verdict.

pub mod attempt;
pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod progress;
pub mod recorder;
pub mod report;
pub mod sink;
pub mod summary;

pub use attempt::WriteAttempt;
pub use config::RunConfig;
pub use driver::{load_key_pool, LoadDriver, RunOutcome, StopReason, StopSignal};
pub use error::{LoadTestError, LoadTestResult, WriteError};
pub use export::{export_attempts, read_attempts_csv, write_attempts_csv};
pub use recorder::{
    FailoverPhase, FailoverTransition, MetricsRecorder, MetricsSnapshot, DEFAULT_RECENT_WINDOW,
};
pub use report::{render_console, write_report, ReportFormat};
pub use sink::{KeySource, ReferenceKey, WriteSink};
pub use summary::{FailoverSummary, SlaVerdict};
