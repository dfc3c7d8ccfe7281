//! Periodic progress output, independent of attempt completion timing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::recorder::{MetricsRecorder, MetricsSnapshot};

/// Render one progress line, or `None` before the first attempt completes.
#[must_use]
pub fn format_progress(snapshot: &MetricsSnapshot) -> Option<String> {
    let recent_rate = snapshot.recent_success_rate()?;
    Some(format!(
        "📊 [PROGRESS] Total: {} | Success: {} | Failed: {} | Recent Success Rate: {:.1}% | Phase: {}",
        snapshot.total,
        snapshot.success_count,
        snapshot.failure_count,
        recent_rate * 100.0,
        snapshot.phase.as_str(),
    ))
}

/// Print a progress line every `every` until the stop signal is raised.
///
/// Returns the number of lines printed.
pub async fn report_progress(
    recorder: Arc<MetricsRecorder>,
    every: Duration,
    mut stop: watch::Receiver<bool>,
) -> usize {
    let mut ticker = interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut printed = 0;

    loop {
        if *stop.borrow() {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {
                if let Some(line) = format_progress(&recorder.snapshot()) {
                    println!("\n{}", line);
                    printed += 1;
                }
            }
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    printed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::WriteAttempt;
    use chrono::Utc;

    #[test]
    fn no_line_before_first_attempt() {
        let recorder = MetricsRecorder::new(50);
        assert!(format_progress(&recorder.snapshot()).is_none());
    }

    #[test]
    fn line_contains_totals_and_recent_rate() {
        let recorder = MetricsRecorder::new(4);
        for _ in 0..3 {
            recorder.record(WriteAttempt::succeeded(Utc::now(), Duration::from_millis(2)));
        }
        recorder.record(WriteAttempt::failed(Utc::now(), Duration::from_millis(2), "refused"));

        let line = format_progress(&recorder.snapshot()).unwrap();
        assert!(line.contains("Total: 4"));
        assert!(line.contains("Failed: 1"));
        assert!(line.contains("Recent Success Rate: 75.0%"));
        assert!(line.contains("Phase: failing"));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_on_interval_until_stopped() {
        let recorder = Arc::new(MetricsRecorder::new(50));
        recorder.record(WriteAttempt::succeeded(Utc::now(), Duration::from_millis(2)));

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(report_progress(
            Arc::clone(&recorder),
            Duration::from_secs(5),
            stop_rx,
        ));

        tokio::time::sleep(Duration::from_secs(16)).await;
        stop_tx.send_replace(true);

        let printed = handle.await.unwrap();
        assert_eq!(printed, 3);
    }
}
