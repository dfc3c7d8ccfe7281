//! Workload driver: concurrent writers, a shared stop signal and the
//! coordinator that turns a finished run into a [`FailoverSummary`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::seq::SliceRandom;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::attempt::WriteAttempt;
use crate::config::RunConfig;
use crate::error::{LoadTestError, LoadTestResult, WriteError};
use crate::progress::report_progress;
use crate::recorder::MetricsRecorder;
use crate::sink::{KeySource, ReferenceKey, WriteSink};
use crate::summary::FailoverSummary;

/// Every this many recorded attempts a worker logs a success line.
const SUCCESS_LOG_EVERY: u64 = 100;

/// Shared stop flag observed by every worker and the progress reporter.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal. Idempotent.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured duration elapsed.
    DurationElapsed,
    /// The stop signal was raised externally (e.g. Ctrl+C).
    Interrupted,
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub reason: StopReason,
    pub elapsed: Duration,
    pub summary: FailoverSummary,
}

/// Load the reference key pool, failing fast when writers would have nothing
/// valid to reference.
pub async fn load_key_pool(
    source: &dyn KeySource,
    workers: usize,
) -> LoadTestResult<Arc<[ReferenceKey]>> {
    if workers == 0 {
        return Ok(Arc::from(Vec::new()));
    }

    let keys = source.load_reference_keys().await?;
    if keys.is_empty() {
        return Err(LoadTestError::NoReferenceKeys);
    }
    info!(count = keys.len(), "Loaded reference keys");
    Ok(Arc::from(keys))
}

/// Drives `workers` concurrent writers against a [`WriteSink`].
pub struct LoadDriver<S> {
    config: RunConfig,
    sink: Arc<S>,
    recorder: Arc<MetricsRecorder>,
    stop: StopSignal,
}

impl<S> LoadDriver<S>
where
    S: WriteSink + 'static,
{
    /// Create a driver; the recorder's run start time is now.
    pub fn new(config: RunConfig, sink: Arc<S>) -> Self {
        let recorder = Arc::new(MetricsRecorder::new(config.recent_window));
        Self {
            config,
            sink,
            recorder,
            stop: StopSignal::new(),
        }
    }

    /// Handle for raising the stop signal from outside the run.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn recorder(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.recorder)
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run until the configured duration elapses or the stop signal is raised,
    /// then wait for every in-flight attempt and summarize.
    pub async fn run(&self, keys: Arc<[ReferenceKey]>) -> LoadTestResult<RunOutcome> {
        self.config.validate()?;
        if self.config.workers > 0 && keys.is_empty() {
            return Err(LoadTestError::NoReferenceKeys);
        }

        let started = Instant::now();
        let delay = self.config.per_worker_delay()?;
        info!(
            sink = %self.sink.describe(),
            workers = self.config.workers,
            writes_per_second = self.config.writes_per_second,
            per_worker_delay_ms = delay.as_millis() as u64,
            "Starting workers"
        );

        let progress = tokio::spawn(report_progress(
            Arc::clone(&self.recorder),
            self.config.report_interval(),
            self.stop.subscribe(),
        ));

        let workers: Vec<JoinHandle<u64>> = (0..self.config.workers)
            .map(|worker_id| {
                let worker = Worker {
                    id: worker_id,
                    sink: Arc::clone(&self.sink),
                    keys: Arc::clone(&keys),
                    recorder: Arc::clone(&self.recorder),
                    delay,
                    timeout: self.config.write_timeout(),
                };
                tokio::spawn(worker.run(self.stop.subscribe()))
            })
            .collect();

        let reason = self.wait_for_stop().await;
        self.stop.stop();

        let mut attempts = 0;
        for handle in workers {
            match handle.await {
                Ok(count) => attempts += count,
                Err(e) => warn!(error = %e, "Worker task ended abnormally"),
            }
        }
        if let Err(e) = progress.await {
            warn!(error = %e, "Progress reporter ended abnormally");
        }

        let elapsed = started.elapsed();
        info!(
            attempts,
            elapsed_secs = elapsed.as_secs_f64(),
            "All workers stopped"
        );

        Ok(RunOutcome {
            reason,
            elapsed,
            summary: FailoverSummary::from_recorder(&self.recorder, self.config.sla_threshold()),
        })
    }

    async fn wait_for_stop(&self) -> StopReason {
        let mut stop = self.stop.subscribe();
        if *stop.borrow_and_update() {
            return StopReason::Interrupted;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.config.duration()) => {
                info!("Test duration completed, stopping workers");
                StopReason::DurationElapsed
            }
            _ = stop.changed() => {
                info!("Stop requested, waiting for in-flight writes");
                StopReason::Interrupted
            }
        }
    }
}

struct Worker<S> {
    id: usize,
    sink: Arc<S>,
    keys: Arc<[ReferenceKey]>,
    recorder: Arc<MetricsRecorder>,
    delay: Duration,
    timeout: Duration,
}

impl<S> Worker<S>
where
    S: WriteSink + 'static,
{
    /// Issue writes until the stop signal is observed between attempts.
    /// Returns the number of attempts recorded.
    async fn run(self, mut stop: watch::Receiver<bool>) -> u64 {
        debug!(worker_id = self.id, "Worker started");
        let mut attempts = 0;

        while !*stop.borrow_and_update() {
            let Some(&key) = self.keys.choose(&mut rand::thread_rng()) else {
                break;
            };

            let attempt = self.attempt(key).await;
            self.log_attempt(&attempt);
            self.recorder.record(attempt);
            attempts += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        debug!(worker_id = self.id, attempts, "Worker stopped");
        attempts
    }

    async fn attempt(&self, key: ReferenceKey) -> WriteAttempt {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, self.sink.write_one(self.id, key)).await
        {
            Ok(result) => result,
            Err(_) => Err(WriteError::Timeout(self.timeout)),
        };
        WriteAttempt::from_result(Utc::now(), started.elapsed(), result)
    }

    fn log_attempt(&self, attempt: &WriteAttempt) {
        if let Some(error) = attempt.error() {
            warn!(
                worker_id = self.id,
                duration_ms = attempt.duration_ms(),
                error,
                "Write failed"
            );
            return;
        }

        let total = self.recorder.success_count() + self.recorder.failure_count() + 1;
        if total % SUCCESS_LOG_EVERY == 0 {
            debug!(
                worker_id = self.id,
                duration_ms = attempt.duration_ms(),
                total,
                "Write succeeded"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedKeys(Vec<ReferenceKey>);

    #[async_trait]
    impl KeySource for FixedKeys {
        async fn load_reference_keys(&self) -> LoadTestResult<Vec<ReferenceKey>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn empty_pool_fails_fast() {
        let err = load_key_pool(&FixedKeys(Vec::new()), 10).await.unwrap_err();
        assert!(matches!(err, LoadTestError::NoReferenceKeys));
        assert!(err.is_setup());
    }

    #[tokio::test]
    async fn zero_workers_skip_key_pool() {
        let keys = load_key_pool(&FixedKeys(Vec::new()), 0).await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn pool_is_loaded_in_order() {
        let keys = load_key_pool(&FixedKeys(vec![3, 1, 2]), 2).await.unwrap();
        assert_eq!(&keys[..], &[3_i64, 1, 2][..]);
    }

    #[test]
    fn stop_signal_is_idempotent() {
        let stop = StopSignal::new();
        let rx = stop.subscribe();
        assert!(!stop.is_stopped());
        stop.stop();
        stop.stop();
        assert!(stop.is_stopped());
        assert!(*rx.borrow());
    }
}
