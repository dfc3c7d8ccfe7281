//! Human-readable and machine-readable renderings of a [`FailoverSummary`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::LoadTestResult;
use crate::summary::{FailoverSummary, SlaVerdict};

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Markdown,
    Json,
}

impl ReportFormat {
    /// File extension used for the report file.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

fn iso(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

/// Console summary printed at the end of every run.
#[must_use]
pub fn render_console(summary: &FailoverSummary) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();

    out.push_str(&format!("\n{rule}\nFAILOVER TEST RESULTS\n{rule}\n"));
    out.push_str("\n📈 OVERALL STATISTICS:\n");
    out.push_str(&format!("  Total write attempts:     {}\n", summary.total_attempts));
    out.push_str(&format!("  Successful writes:        {}\n", summary.successful_writes));
    out.push_str(&format!("  Failed writes:            {}\n", summary.failed_writes));
    out.push_str(&format!(
        "  Overall success rate:     {:.2}%\n",
        summary.success_rate_pct()
    ));

    if let (Some(avg), Some(median)) = (
        summary.avg_write_duration_ms,
        summary.median_write_duration_ms,
    ) {
        out.push_str("\n⏱️  WRITE PERFORMANCE (successful writes only):\n");
        out.push_str(&format!("  Average duration:         {:.2} ms\n", avg));
        out.push_str(&format!("  Median duration:          {:.2} ms\n", median));
    }

    match summary.failover_duration {
        Some(window) => {
            out.push_str("\n🔄 FAILOVER METRICS:\n");
            out.push_str(&format!(
                "  Test start time:          {}\n",
                iso(Some(summary.test_start_time))
            ));
            out.push_str(&format!(
                "  First failure detected:   {}\n",
                iso(summary.first_failure_time)
            ));
            out.push_str(&format!(
                "  First recovery detected:  {}\n",
                iso(summary.first_recovery_time)
            ));
            out.push_str(&format!(
                "  Last failure detected:    {}\n",
                iso(summary.last_failure_time)
            ));
            out.push_str(&format!(
                "  ⭐ FAILOVER DURATION:      {:.2} seconds\n",
                window.as_secs_f64()
            ));
            out.push_str(&format!(
                "  Target SLA:               < {} seconds\n",
                summary.sla_threshold.as_secs()
            ));
            if summary.sla.passed() {
                out.push_str("  ✅ PASSED - Within SLA target\n");
            } else {
                out.push_str("  ❌ EXCEEDED SLA target\n");
            }
        }
        None => {
            out.push_str("\n⚠️  NO FAILOVER DETECTED\n");
            if summary.first_failure_time.is_some() {
                out.push_str(&format!(
                    "  Writes started failing at {} and never recovered.\n",
                    iso(summary.first_failure_time)
                ));
            } else {
                out.push_str("  Either no failover occurred, or the test was too short.\n");
            }
            out.push_str("  To measure failover: trigger a planned failover during the test.\n");
        }
    }

    out.push_str(&format!("\n{rule}\n"));
    out
}

/// Markdown report, suitable for attaching to a change record.
#[must_use]
pub fn render_markdown(summary: &FailoverSummary) -> String {
    let status = match summary.sla {
        SlaVerdict::Passed => "✅ PASSED",
        SlaVerdict::Exceeded => "❌ EXCEEDED",
        SlaVerdict::NotObserved => "⚠️ NO FAILOVER DETECTED",
    };
    let ms = |v: Option<f64>| {
        v.map(|v| format!("{:.2}ms", v))
            .unwrap_or_else(|| "-".to_string())
    };

    format!(
        r#"# Failover Load Test Report

**Status**: {}

---

## Summary

- **Total Attempts**: {}
- **Successful**: {}
- **Failed**: {}
- **Success Rate**: {:.2}%

---

## Write Latency (successful writes)

| Statistic | Latency |
|-----------|---------|
| Mean | {} |
| Median | {} |

---

## Failover

- **Test Start**: {}
- **First Failure**: {}
- **First Recovery**: {}
- **Last Failure**: {}
- **Failover Duration**: {}
- **Target SLA**: < {} seconds

---

**Report Generated**: {}
"#,
        status,
        summary.total_attempts,
        summary.successful_writes,
        summary.failed_writes,
        summary.success_rate_pct(),
        ms(summary.avg_write_duration_ms),
        ms(summary.median_write_duration_ms),
        iso(Some(summary.test_start_time)),
        iso(summary.first_failure_time),
        iso(summary.first_recovery_time),
        iso(summary.last_failure_time),
        summary
            .failover_duration
            .map(|d| format!("{:.2} seconds", d.as_secs_f64()))
            .unwrap_or_else(|| "not observed".to_string()),
        summary.sla_threshold.as_secs(),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
    )
}

/// JSON report.
pub fn render_json(summary: &FailoverSummary) -> LoadTestResult<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Write the report as `failover_report.<ext>` under `dir`.
pub fn write_report(
    dir: impl AsRef<Path>,
    summary: &FailoverSummary,
    format: ReportFormat,
) -> LoadTestResult<PathBuf> {
    let content = match format {
        ReportFormat::Markdown => render_markdown(summary),
        ReportFormat::Json => render_json(summary)?,
    };

    let path = dir
        .as_ref()
        .join(format!("failover_report.{}", format.extension()));
    let mut file = File::create(&path)?;
    file.write_all(content.as_bytes())?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::WriteAttempt;
    use crate::recorder::MetricsRecorder;
    use chrono::TimeZone;
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn summary_with_failover(sla_secs: u64) -> FailoverSummary {
        let recorder = MetricsRecorder::starting_at(at(0), 50);
        recorder.record(WriteAttempt::succeeded(at(1), Duration::from_millis(4)));
        recorder.record(WriteAttempt::failed(at(10), Duration::from_secs(5), "timeout"));
        recorder.record(WriteAttempt::succeeded(at(40), Duration::from_millis(6)));
        FailoverSummary::from_recorder(&recorder, Duration::from_secs(sla_secs))
    }

    #[test]
    fn console_reports_missing_failover_explicitly() {
        let recorder = MetricsRecorder::starting_at(at(0), 50);
        recorder.record(WriteAttempt::succeeded(at(1), Duration::from_millis(4)));
        let summary = FailoverSummary::from_recorder(&recorder, Duration::from_secs(120));

        let text = render_console(&summary);
        assert!(text.contains("NO FAILOVER DETECTED"));
        assert!(text.contains("Overall success rate:     100.00%"));
        assert!(!text.contains("FAILOVER DURATION"));
    }

    #[test]
    fn console_shows_duration_and_verdict() {
        let text = render_console(&summary_with_failover(120));
        assert!(text.contains("FAILOVER DURATION:      30.00 seconds"));
        assert!(text.contains("PASSED - Within SLA target"));

        let text = render_console(&summary_with_failover(30));
        assert!(text.contains("EXCEEDED SLA target"));
    }

    #[test]
    fn writes_markdown_and_json_reports() {
        let dir = tempfile::tempdir().unwrap();
        let summary = summary_with_failover(120);

        let md = write_report(dir.path(), &summary, ReportFormat::Markdown).unwrap();
        let md = std::fs::read_to_string(md).unwrap();
        assert!(md.contains("**Status**: ✅ PASSED"));
        assert!(md.contains("**Failover Duration**: 30.00 seconds"));

        let json = write_report(dir.path(), &summary, ReportFormat::Json).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json).unwrap()).unwrap();
        assert_eq!(value["total_attempts"], 3);
        assert_eq!(value["sla"], "passed");
    }
}
