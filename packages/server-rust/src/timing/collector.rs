//! Timing collector: a bounded queue in front of one dedicated worker.
//!
//! Processing calls submit samples through a cloneable [`TimingHandle`]
//! that never blocks and never fails; when the queue is full the sample is
//! dropped with a warning. The [`TimingCollector`] owns the worker and is
//! started and shut down explicitly by the service that uses it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docproc_core::{TimingSample, TimingSink};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::aggregate::{TimingAggregator, TimingSummary};
use crate::service::worker::{BackgroundWorker, TrySubmitError, WorkerSender};

/// Tasks handled by the collector's worker.
#[derive(Debug)]
pub enum TimingTask {
    /// Fold one sample into the aggregates.
    Record(TimingSample),
    /// Reply with a snapshot of the aggregates.
    Summary(oneshot::Sender<TimingSummary>),
}

/// Queue sizing and reporting cadence for the timing collector.
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Bounded queue capacity; samples beyond it are dropped.
    pub queue_capacity: usize,
    /// How often the worker logs its aggregates at debug level. `None` disables it.
    pub report_interval: Option<Duration>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            report_interval: None,
        }
    }
}

// ---------------------------------------------------------------------------
// TimingHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable submission handle. Implements [`TimingSink`].
#[derive(Debug, Clone)]
pub struct TimingHandle {
    tx: WorkerSender<TimingTask>,
    dropped: Arc<AtomicU64>,
}

impl TimingHandle {
    /// Number of samples dropped because the queue was full or closed.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn drop_task(&self, task: &TimingTask, reason: &'static str) {
        let TimingTask::Record(sample) = task else {
            return;
        };
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("docproc_timing_samples_dropped_total", "reason" => reason).increment(1);
        warn!(key = %sample.key, reason, "timing sample dropped");
    }
}

impl TimingSink for TimingHandle {
    fn submit(&self, sample: TimingSample) {
        match self.tx.try_submit(TimingTask::Record(sample)) {
            Ok(()) => {}
            Err(TrySubmitError::Full(task)) => self.drop_task(&task, "queue_full"),
            Err(TrySubmitError::Closed(task)) => self.drop_task(&task, "collector_stopped"),
        }
    }
}

// ---------------------------------------------------------------------------
// TimingCollector
// ---------------------------------------------------------------------------

/// Owner of the timing worker.
pub struct TimingCollector {
    handle: TimingHandle,
    worker: Mutex<Option<BackgroundWorker<TimingAggregator>>>,
}

impl TimingCollector {
    /// Spawns the collector's dedicated worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime or with a zero queue capacity.
    #[must_use]
    pub fn start(config: &TimingConfig) -> Self {
        let worker = BackgroundWorker::start(
            TimingAggregator::new(),
            config.queue_capacity,
            config.report_interval,
        );
        info!(capacity = config.queue_capacity, "timing collector started");
        Self {
            handle: TimingHandle {
                tx: worker.sender(),
                dropped: Arc::new(AtomicU64::new(0)),
            },
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Submission handle for processing calls.
    #[must_use]
    pub fn handle(&self) -> TimingHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(BackgroundWorker::is_running)
    }

    /// Aggregates of every sample the worker has processed so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector has been shut down.
    pub async fn summary(&self) -> anyhow::Result<TimingSummary> {
        let (reply, rx) = oneshot::channel();
        self.handle
            .tx
            .submit(TimingTask::Summary(reply))
            .await
            .map_err(|_| anyhow::anyhow!("timing collector is shut down"))?;
        rx.await
            .map_err(|_| anyhow::anyhow!("timing collector stopped before replying"))
    }

    /// Stops the worker after it has drained queued samples. Idempotent.
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(mut worker) = worker {
            worker.stop().await;
        }
    }
}

impl std::fmt::Debug for TimingCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingCollector")
            .field("running", &self.is_running())
            .field("dropped", &self.handle.dropped_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use docproc_core::{ProcessingScope, TimingKey};

    use super::*;

    fn sample(stopwatch: &str) -> TimingSample {
        TimingSample {
            key: TimingKey::new("processor", stopwatch),
            duration: Duration::from_millis(1),
            observed_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn submitted_samples_appear_in_summary() {
        let collector = TimingCollector::start(&TimingConfig::default());
        let handle = collector.handle();
        handle.submit(sample("foo"));
        handle.submit(sample("foo"));
        handle.submit(sample("bar"));

        let summary = collector.summary().await.unwrap();
        assert_eq!(
            summary.get(&TimingKey::new("processor", "foo")).unwrap().count,
            2
        );
        assert_eq!(summary.len(), 2);
        collector.shutdown().await;
    }

    #[tokio::test]
    async fn stopwatch_in_scope_reaches_collector() {
        let collector = TimingCollector::start(&TimingConfig::default());
        let scope = ProcessingScope::new(Arc::new(collector.handle()));
        {
            let _guard = scope.enter("processor");
            let mut stopwatch = scope.started_stopwatch("foo");
            stopwatch.stop().unwrap();
        }
        let mut orphan = scope.started_stopwatch("orphan");
        orphan.stop().unwrap();

        let summary = collector.summary().await.unwrap();
        assert_eq!(summary.len(), 1);
        assert!(summary.get(&TimingKey::new("processor", "foo")).is_some());
        collector.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        // Current-thread runtime: the worker cannot drain while this test
        // runs synchronously, so the second and third samples overflow.
        let collector = TimingCollector::start(&TimingConfig {
            queue_capacity: 1,
            report_interval: None,
        });
        let handle = collector.handle();
        handle.submit(sample("a"));
        handle.submit(sample("b"));
        handle.submit(sample("c"));

        assert_eq!(handle.dropped_count(), 2);
        collector.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_queue_then_rejects() {
        let collector = TimingCollector::start(&TimingConfig::default());
        let handle = collector.handle();
        handle.submit(sample("foo"));

        collector.shutdown().await;
        assert!(!collector.is_running());
        assert!(collector.summary().await.is_err());

        handle.submit(sample("late"));
        assert_eq!(handle.dropped_count(), 1);
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let collector = TimingCollector::start(&TimingConfig::default());
        collector.shutdown().await;
        collector.shutdown().await;
        assert!(!collector.is_running());
    }
}
