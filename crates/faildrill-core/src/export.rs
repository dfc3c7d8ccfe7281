//! CSV export of the raw attempt log, and the reader used for offline analysis.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};

use crate::attempt::WriteAttempt;
use crate::error::{LoadTestError, LoadTestResult};

/// One CSV row per attempt: `timestamp,success,duration_ms,error`.
#[derive(Debug, Serialize, Deserialize)]
struct AttemptRow {
    timestamp: String,
    #[serde(deserialize_with = "deserialize_flag")]
    success: bool,
    duration_ms: String,
    error: String,
}

impl From<&WriteAttempt> for AttemptRow {
    fn from(attempt: &WriteAttempt) -> Self {
        Self {
            timestamp: attempt
                .timestamp()
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            success: attempt.success(),
            duration_ms: format!("{:.2}", attempt.duration_ms()),
            error: attempt.error().unwrap_or_default().to_string(),
        }
    }
}

impl TryFrom<AttemptRow> for WriteAttempt {
    type Error = LoadTestError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&row.timestamp)?;

        let duration_ms: f64 = row.duration_ms.trim().parse().map_err(|_| {
            LoadTestError::invalid_record(format!("invalid duration_ms '{}'", row.duration_ms))
        })?;
        let duration = Duration::try_from_secs_f64(duration_ms / 1000.0).map_err(|_| {
            LoadTestError::invalid_record(format!(
                "duration_ms must be a non-negative number of milliseconds, got {}",
                row.duration_ms.trim()
            ))
        })?;

        Ok(if row.success {
            WriteAttempt::succeeded(timestamp, duration)
        } else {
            WriteAttempt::failed(timestamp, duration, row.error)
        })
    }
}

/// Accepts `true`/`false` in any case, plus `1`/`0`.
fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "invalid success flag '{}'",
            other
        ))),
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp read as local time.
fn parse_timestamp(raw: &str) -> LoadTestResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .and_then(|naive| Local.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| LoadTestError::invalid_record(format!("invalid timestamp '{}'", raw)))
}

/// Default export file name, stamped with the local time of the export.
#[must_use]
pub fn results_file_name(now: DateTime<Local>) -> String {
    format!("failover_test_results_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Write the attempt log to `dir`, returning the created file's path.
pub fn export_attempts(dir: impl AsRef<Path>, attempts: &[WriteAttempt]) -> LoadTestResult<PathBuf> {
    let path = dir.as_ref().join(results_file_name(Local::now()));
    write_attempts_csv(&path, attempts)?;
    Ok(path)
}

/// Write the attempt log as CSV to an explicit path.
pub fn write_attempts_csv(path: impl AsRef<Path>, attempts: &[WriteAttempt]) -> LoadTestResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for attempt in attempts {
        writer.serialize(AttemptRow::from(attempt))?;
    }
    // An empty log still gets a header row.
    if attempts.is_empty() {
        writer.write_record(["timestamp", "success", "duration_ms", "error"])?;
    }

    writer.flush()?;
    Ok(())
}

/// Read an exported attempt log back, in file order.
pub fn read_attempts_csv(path: impl AsRef<Path>) -> LoadTestResult<Vec<WriteAttempt>> {
    let file = File::open(path.as_ref())?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    reader
        .deserialize::<AttemptRow>()
        .map(|row| WriteAttempt::try_from(row?))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::MetricsRecorder;
    use crate::summary::FailoverSummary;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 250_000_000).unwrap()
    }

    #[test]
    fn reimported_log_reproduces_summary() {
        let recorder = MetricsRecorder::starting_at(at(0), 50);
        let latencies = [3.217, 4.5, 12.0, 7.333, 5.05];
        for (i, ms) in latencies.iter().enumerate() {
            recorder.record(WriteAttempt::succeeded(
                at(i as i64),
                Duration::from_secs_f64(ms / 1000.0),
            ));
        }
        recorder.record(WriteAttempt::failed(
            at(10),
            Duration::from_millis(5_000),
            "server closed the connection unexpectedly, \"retry\"",
        ));
        recorder.record(WriteAttempt::succeeded(at(14), Duration::from_millis(9)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        write_attempts_csv(&path, &recorder.attempts()).unwrap();

        let reread = read_attempts_csv(&path).unwrap();
        let replayed = MetricsRecorder::replay(at(0), 50, reread.clone());

        let sla = Duration::from_secs(120);
        let original = FailoverSummary::from_recorder(&recorder, sla);
        let restored = FailoverSummary::from_recorder(&replayed, sla);

        assert_eq!(restored.successful_writes, original.successful_writes);
        assert_eq!(restored.failed_writes, original.failed_writes);
        let tolerance = 0.01;
        assert!(
            (restored.avg_write_duration_ms.unwrap() - original.avg_write_duration_ms.unwrap())
                .abs()
                < tolerance
        );
        assert!(
            (restored.median_write_duration_ms.unwrap()
                - original.median_write_duration_ms.unwrap())
            .abs()
                < tolerance
        );
        assert_eq!(restored.failover_duration, original.failover_duration);
        assert_eq!(
            reread[5].error(),
            Some("server closed the connection unexpectedly, \"retry\"")
        );
    }

    #[test]
    fn empty_log_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        write_attempts_csv(&path, &[]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.trim(), "timestamp,success,duration_ms,error");
        assert!(read_attempts_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn export_uses_timestamped_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = export_attempts(dir.path(), &[]).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("failover_test_results_"));
        assert!(name.ends_with(".csv"));
    }

    #[test]
    fn export_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let err = export_attempts(&missing, &[]).unwrap_err();
        assert!(matches!(err, LoadTestError::Io(_)));
    }

    #[test]
    fn reads_capitalized_flags_and_naive_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.csv");
        std::fs::write(
            &path,
            "timestamp,success,duration_ms,error\n\
             2024-05-01T10:00:00.123456,True,4.20,\n\
             2024-05-01T10:00:01.000000,False,5000.00,could not connect to server\n",
        )
        .unwrap();

        let attempts = read_attempts_csv(&path).unwrap();
        assert_eq!(attempts.len(), 2);
        assert!(attempts[0].success());
        assert!(!attempts[1].success());
        assert_eq!(attempts[1].error(), Some("could not connect to server"));
        assert_eq!(
            (attempts[1].timestamp() - attempts[0].timestamp()).num_microseconds(),
            Some(876_544)
        );
    }

    #[test]
    fn rejects_negative_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            "timestamp,success,duration_ms,error\n2024-01-01T00:00:00Z,true,-1.00,\n",
        )
        .unwrap();
        assert!(matches!(
            read_attempts_csv(&path),
            Err(LoadTestError::InvalidRecord { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.csv");
        std::fs::write(
            &path,
            "timestamp,success,duration_ms,error\n2024-01-01T00:00:00Z,true,1e300,\n",
        )
        .unwrap();

        let err = read_attempts_csv(&path).unwrap_err();
        assert!(matches!(err, LoadTestError::InvalidRecord { .. }));
        assert!(err.to_string().contains("1e300"));
    }

    #[test]
    fn rejects_unparseable_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("when.csv");
        std::fs::write(
            &path,
            "timestamp,success,duration_ms,error\nyesterday,false,3.00,boom\n",
        )
        .unwrap();
        assert!(matches!(
            read_attempts_csv(&path),
            Err(LoadTestError::InvalidRecord { .. })
        ));
    }
}
