//! Outcome recorder shared by every worker of a run.
//!
//! The recorder owns the append-only attempt log, the running success and
//! failure counters, and the failover window: a small state machine that
//! pins the first failure and the first recovery that follows it.
//!
//! # Phases
//!
//! - **Stable:** no failure recorded yet
//! - **Failing:** first failure pinned, waiting for a success
//! - **Recovered:** first recovery pinned; terminal, later failures are
//!   still counted but never move the window
//!
//! "First" means first in append order, which is completion order as seen by
//! the recorder and may trail wall-clock order by scheduling jitter.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::attempt::WriteAttempt;

/// Default number of recent attempts kept in a [`MetricsSnapshot`].
pub const DEFAULT_RECENT_WINDOW: usize = 50;

/// Position of the run in the failover state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverPhase {
    Stable,
    Failing,
    Recovered,
}

impl FailoverPhase {
    fn to_u8(self) -> u8 {
        match self {
            Self::Stable => 0,
            Self::Failing => 1,
            Self::Recovered => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Stable,
            1 => Self::Failing,
            _ => Self::Recovered,
        }
    }

    /// Lowercase name used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Failing => "failing",
            Self::Recovered => "recovered",
        }
    }
}

/// Transition produced by a single `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailoverTransition {
    /// Stable -> Failing at the given timestamp.
    FailureDetected(DateTime<Utc>),
    /// Failing -> Recovered at the given timestamp.
    RecoveryDetected(DateTime<Utc>),
}

/// Set-once failover window.
///
/// Each field is assigned through a single atomic set-once operation, so
/// exactly one caller wins each transition.
#[derive(Debug)]
struct FailoverWindow {
    phase: AtomicU8,
    first_failure_at: OnceLock<DateTime<Utc>>,
    first_recovery_at: OnceLock<DateTime<Utc>>,
}

impl FailoverWindow {
    fn new() -> Self {
        Self {
            phase: AtomicU8::new(FailoverPhase::Stable.to_u8()),
            first_failure_at: OnceLock::new(),
            first_recovery_at: OnceLock::new(),
        }
    }

    fn phase(&self) -> FailoverPhase {
        FailoverPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    fn on_failure(&self, at: DateTime<Utc>) -> bool {
        // The phase only advances after the timestamp is visible, which keeps
        // `first_recovery_at => first_failure_at` for concurrent readers.
        if self.first_failure_at.set(at).is_ok() {
            self.phase
                .store(FailoverPhase::Failing.to_u8(), Ordering::Release);
            true
        } else {
            false
        }
    }

    fn on_success(&self, at: DateTime<Utc>) -> bool {
        let Some(failed_at) = self.first_failure_at.get() else {
            return false;
        };
        if at <= *failed_at {
            return false;
        }
        let won = self
            .phase
            .compare_exchange(
                FailoverPhase::Failing.to_u8(),
                FailoverPhase::Recovered.to_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        won && self.first_recovery_at.set(at).is_ok()
    }
}

#[derive(Debug, Default)]
struct AttemptLog {
    attempts: Vec<WriteAttempt>,
    last_failure_at: Option<DateTime<Utc>>,
}

/// Point-in-time view used by the progress reporter.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub total: usize,
    pub success_count: u64,
    pub failure_count: u64,
    pub phase: FailoverPhase,
    /// Most recent attempts, oldest first.
    pub recent: Vec<WriteAttempt>,
}

impl MetricsSnapshot {
    /// Success rate over the recent window (0.0-1.0), `None` before any attempt.
    #[must_use]
    pub fn recent_success_rate(&self) -> Option<f64> {
        if self.recent.is_empty() {
            return None;
        }
        let successes = self.recent.iter().filter(|a| a.success()).count();
        Some(successes as f64 / self.recent.len() as f64)
    }
}

/// Thread-safe append-only record of every attempt in a run.
#[derive(Debug)]
pub struct MetricsRecorder {
    log: Mutex<AttemptLog>,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    window: FailoverWindow,
    started_at: DateTime<Utc>,
    recent_window: usize,
}

impl MetricsRecorder {
    /// Create an empty recorder whose run started now.
    #[must_use]
    pub fn new(recent_window: usize) -> Self {
        Self::starting_at(Utc::now(), recent_window)
    }

    /// Create an empty recorder with an explicit run start time.
    #[must_use]
    pub fn starting_at(started_at: DateTime<Utc>, recent_window: usize) -> Self {
        Self {
            log: Mutex::new(AttemptLog::default()),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            window: FailoverWindow::new(),
            started_at,
            recent_window: recent_window.max(1),
        }
    }

    /// Rebuild a recorder by replaying attempts in order.
    pub fn replay(
        started_at: DateTime<Utc>,
        recent_window: usize,
        attempts: impl IntoIterator<Item = WriteAttempt>,
    ) -> Self {
        let recorder = Self::starting_at(started_at, recent_window);
        for attempt in attempts {
            recorder.record(attempt);
        }
        recorder
    }

    /// Append an attempt and advance the failover window.
    ///
    /// The append, the counter update and the window transition happen in one
    /// critical section, so detection follows append order.
    pub fn record(&self, attempt: WriteAttempt) -> Option<FailoverTransition> {
        let at = attempt.timestamp();
        let mut log = self.log.lock();

        let transition = if attempt.success() {
            self.success_count.fetch_add(1, Ordering::Relaxed);
            self.window
                .on_success(at)
                .then_some(FailoverTransition::RecoveryDetected(at))
        } else {
            self.failure_count.fetch_add(1, Ordering::Relaxed);
            log.last_failure_at = Some(at);
            self.window
                .on_failure(at)
                .then_some(FailoverTransition::FailureDetected(at))
        };

        log.attempts.push(attempt);
        drop(log);

        match transition {
            Some(FailoverTransition::FailureDetected(at)) => {
                warn!(
                    at = %at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    "First write failure detected"
                );
            }
            Some(FailoverTransition::RecoveryDetected(at)) => {
                info!(
                    at = %at.to_rfc3339_opts(SecondsFormat::Millis, true),
                    "First successful write after failure detected"
                );
            }
            None => {}
        }

        transition
    }

    /// Consistent view of the counters and the recent tail.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let log = self.log.lock();
        let total = log.attempts.len();
        let start = total.saturating_sub(self.recent_window);

        MetricsSnapshot {
            total,
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            phase: self.window.phase(),
            recent: log.attempts[start..].to_vec(),
        }
    }

    /// Copy of the full attempt log in append order.
    #[must_use]
    pub fn attempts(&self) -> Vec<WriteAttempt> {
        self.log.lock().attempts.clone()
    }

    pub fn len(&self) -> usize {
        self.log.lock().attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock-free success counter; may trail `len()` under concurrent writers.
    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    /// Lock-free failure counter; may trail `len()` under concurrent writers.
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn phase(&self) -> FailoverPhase {
        self.window.phase()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn first_failure_at(&self) -> Option<DateTime<Utc>> {
        self.window.first_failure_at.get().copied()
    }

    pub fn first_recovery_at(&self) -> Option<DateTime<Utc>> {
        self.window.first_recovery_at.get().copied()
    }

    pub fn last_failure_at(&self) -> Option<DateTime<Utc>> {
        self.log.lock().last_failure_at
    }

    pub fn recent_window(&self) -> usize {
        self.recent_window
    }
}
