//! Availability verdict derived from the final attempt log.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::attempt::WriteAttempt;
use crate::recorder::MetricsRecorder;

/// Outcome of comparing the failover window against the SLA threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaVerdict {
    /// Failover observed and strictly shorter than the threshold.
    Passed,
    /// Failover observed but at or above the threshold.
    Exceeded,
    /// No failure/recovery pair observed; the SLA cannot pass.
    NotObserved,
}

impl SlaVerdict {
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Final statistics of a run.
#[derive(Debug, Clone, Serialize)]
pub struct FailoverSummary {
    pub total_attempts: usize,
    pub successful_writes: u64,
    pub failed_writes: u64,
    /// Successes over total (0.0-1.0); 0 when nothing was attempted.
    pub success_rate: f64,
    pub test_start_time: DateTime<Utc>,
    pub first_failure_time: Option<DateTime<Utc>>,
    pub first_recovery_time: Option<DateTime<Utc>>,
    pub last_failure_time: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_opt_secs")]
    pub failover_duration: Option<Duration>,
    /// Mean latency of successful writes in milliseconds.
    pub avg_write_duration_ms: Option<f64>,
    /// Median latency of successful writes in milliseconds.
    pub median_write_duration_ms: Option<f64>,
    #[serde(serialize_with = "serialize_secs")]
    pub sla_threshold: Duration,
    pub sla: SlaVerdict,
}

impl FailoverSummary {
    /// Summarize the recorder's final state against an SLA threshold.
    #[must_use]
    pub fn from_recorder(recorder: &MetricsRecorder, sla_threshold: Duration) -> Self {
        let attempts = recorder.attempts();
        let successful_ms: Vec<f64> = attempts
            .iter()
            .filter(|a| a.success())
            .map(WriteAttempt::duration_ms)
            .collect();

        let total_attempts = attempts.len();
        let successful_writes = successful_ms.len() as u64;
        let failed_writes = (total_attempts - successful_ms.len()) as u64;

        let first_failure_time = recorder.first_failure_at();
        let first_recovery_time = recorder.first_recovery_at();
        let failover_duration = failover_window(first_failure_time, first_recovery_time);

        Self {
            total_attempts,
            successful_writes,
            failed_writes,
            success_rate: ratio(successful_writes, total_attempts),
            test_start_time: recorder.started_at(),
            first_failure_time,
            first_recovery_time,
            last_failure_time: recorder.last_failure_at(),
            failover_duration,
            avg_write_duration_ms: mean(&successful_ms),
            median_write_duration_ms: median(&successful_ms),
            sla_threshold,
            sla: judge(failover_duration, sla_threshold),
        }
    }

    /// Success rate as a percentage.
    #[must_use]
    pub fn success_rate_pct(&self) -> f64 {
        self.success_rate * 100.0
    }

    #[must_use]
    pub fn failover_observed(&self) -> bool {
        self.failover_duration.is_some()
    }
}

fn failover_window(
    first_failure: Option<DateTime<Utc>>,
    first_recovery: Option<DateTime<Utc>>,
) -> Option<Duration> {
    let (failed, recovered) = (first_failure?, first_recovery?);
    // Recovery is never pinned before the failure it follows.
    (recovered - failed).to_std().ok()
}

fn judge(failover: Option<Duration>, threshold: Duration) -> SlaVerdict {
    match failover {
        Some(window) if window < threshold => SlaVerdict::Passed,
        Some(_) => SlaVerdict::Exceeded,
        None => SlaVerdict::NotObserved,
    }
}

fn ratio(part: u64, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(value.as_secs_f64())
}

fn serialize_opt_secs<S: serde::Serializer>(
    value: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn recorder() -> MetricsRecorder {
        MetricsRecorder::starting_at(at(0), 50)
    }

    #[test]
    fn empty_run_reports_zero_rate() {
        let summary = FailoverSummary::from_recorder(&recorder(), Duration::from_secs(120));

        assert_eq!(summary.total_attempts, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert_eq!(summary.avg_write_duration_ms, None);
        assert_eq!(summary.median_write_duration_ms, None);
        assert_eq!(summary.failover_duration, None);
        assert_eq!(summary.sla, SlaVerdict::NotObserved);
    }

    #[test]
    fn failure_at_ten_recovery_at_fifteen() {
        let recorder = recorder();
        for s in 0..10 {
            recorder.record(WriteAttempt::succeeded(at(s), Duration::from_millis(5)));
        }
        recorder.record(WriteAttempt::failed(at(10), Duration::from_millis(900), "timeout"));
        recorder.record(WriteAttempt::succeeded(at(15), Duration::from_millis(5)));

        let summary = FailoverSummary::from_recorder(&recorder, Duration::from_secs(120));
        assert_eq!(summary.first_failure_time, Some(at(10)));
        assert_eq!(summary.first_recovery_time, Some(at(15)));
        assert_eq!(summary.failover_duration, Some(Duration::from_secs(5)));
        assert_eq!(summary.sla, SlaVerdict::Passed);

        let strict = FailoverSummary::from_recorder(&recorder, Duration::from_secs(5));
        assert_eq!(strict.sla, SlaVerdict::Exceeded);

        let loose = FailoverSummary::from_recorder(&recorder, Duration::from_secs(6));
        assert!(loose.sla.passed());
    }

    #[test]
    fn latency_stats_ignore_failures() {
        let recorder = recorder();
        for ms in [10, 20, 30, 40] {
            recorder.record(WriteAttempt::succeeded(at(1), Duration::from_millis(ms)));
        }
        recorder.record(WriteAttempt::failed(at(2), Duration::from_secs(10), "refused"));

        let summary = FailoverSummary::from_recorder(&recorder, Duration::from_secs(120));
        assert_eq!(summary.avg_write_duration_ms, Some(25.0));
        assert_eq!(summary.median_write_duration_ms, Some(25.0));
        assert_eq!(summary.successful_writes, 4);
        assert_eq!(summary.failed_writes, 1);
        assert!((summary.success_rate - 0.8).abs() < 1e-12);
    }

    #[test]
    fn odd_median_takes_middle_value() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn failure_without_recovery_is_not_observed() {
        let recorder = recorder();
        recorder.record(WriteAttempt::failed(at(3), Duration::from_millis(1), "refused"));

        let summary = FailoverSummary::from_recorder(&recorder, Duration::from_secs(120));
        assert!(summary.first_failure_time.is_some());
        assert!(!summary.failover_observed());
        assert_eq!(summary.sla, SlaVerdict::NotObserved);
    }

    #[test]
    fn serializes_durations_as_seconds() {
        let recorder = recorder();
        recorder.record(WriteAttempt::failed(at(10), Duration::from_millis(1), "x"));
        recorder.record(WriteAttempt::succeeded(at(12), Duration::from_millis(1)));

        let summary = FailoverSummary::from_recorder(&recorder, Duration::from_secs(120));
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["failover_duration"], 2.0);
        assert_eq!(json["sla_threshold"], 120.0);
        assert_eq!(json["sla"], "passed");
    }
}
