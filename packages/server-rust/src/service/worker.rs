//! Dedicated background worker draining a bounded task queue.
//!
//! `BackgroundWorker<R>` owns one tokio task that feeds queued tasks to a
//! `BackgroundRunnable` sequentially, optionally ticks it on an interval,
//! and drains whatever is still queued when it is stopped.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

// ---------------------------------------------------------------------------
// BackgroundRunnable trait
// ---------------------------------------------------------------------------

/// Task handler executed by `BackgroundWorker`.
#[async_trait]
pub trait BackgroundRunnable: Send + 'static {
    /// The type of task this runnable processes.
    type Task: Send + 'static;

    /// Process a single task.
    async fn run(&mut self, task: Self::Task);

    /// Called on each tick when the worker has a tick interval. Default is a no-op.
    async fn on_tick(&mut self) {}

    /// Called once after the queue has been drained on stop. Default is a no-op.
    async fn shutdown(&mut self) {}
}

/// Why a non-blocking submission was rejected. The task is handed back.
#[derive(Debug)]
pub enum TrySubmitError<T> {
    /// The queue is at capacity.
    Full(T),
    /// The worker has been stopped.
    Closed(T),
}

// ---------------------------------------------------------------------------
// BackgroundWorker
// ---------------------------------------------------------------------------

/// Handle to a running background worker.
///
/// The worker task:
/// 1. Receives tasks from the bounded mpsc queue and runs them in order
/// 2. Calls `on_tick()` at the configured interval, if any
/// 3. On stop, closes the queue, runs every task still queued, then calls `shutdown()`
pub struct BackgroundWorker<R: BackgroundRunnable> {
    tx: mpsc::Sender<R::Task>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl<R: BackgroundRunnable> BackgroundWorker<R> {
    /// Spawns the worker task on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime or if `capacity` is zero.
    pub fn start(mut runnable: R, capacity: usize, tick_interval: Option<Duration>) -> Self {
        let (tx, mut rx) = mpsc::channel::<R::Task>(capacity);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            // A week-long period stands in for "never" when ticking is disabled.
            let period = tick_interval.unwrap_or(Duration::from_secs(7 * 24 * 3600));
            let mut ticks = tokio::time::interval(period);
            // Skip the first immediate tick so on_tick doesn't fire at startup.
            ticks.tick().await;

            loop {
                tokio::select! {
                    task = rx.recv() => {
                        match task {
                            Some(t) => runnable.run(t).await,
                            None => break,
                        }
                    }
                    _ = ticks.tick(), if tick_interval.is_some() => {
                        runnable.on_tick().await;
                    }
                    _ = &mut shutdown_rx => {
                        break;
                    }
                }
            }

            rx.close();
            while let Some(task) = rx.recv().await {
                runnable.run(task).await;
            }
            runnable.shutdown().await;
        });

        Self {
            tx,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// A cloneable handle that feeds this worker's queue.
    #[must_use]
    pub fn sender(&self) -> WorkerSender<R::Task> {
        WorkerSender {
            tx: self.tx.clone(),
        }
    }

    /// Whether `stop()` has not been called yet.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the worker, waiting until queued tasks are drained.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

// ---------------------------------------------------------------------------
// WorkerSender
// ---------------------------------------------------------------------------

/// Cloneable submission side of a [`BackgroundWorker`] queue.
#[derive(Debug)]
pub struct WorkerSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> Clone for WorkerSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Send + 'static> WorkerSender<T> {
    /// Submit a task, waiting for queue capacity.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker has been stopped.
    pub async fn submit(&self, task: T) -> anyhow::Result<()> {
        self.tx
            .send(task)
            .await
            .map_err(|_| anyhow::anyhow!("worker channel closed"))
    }

    /// Submit a task without waiting.
    ///
    /// # Errors
    ///
    /// Returns the task inside [`TrySubmitError`] if the queue is full or the
    /// worker has been stopped.
    pub fn try_submit(&self, task: T) -> Result<(), TrySubmitError<T>> {
        self.tx.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(t) => TrySubmitError::Full(t),
            mpsc::error::TrySendError::Closed(t) => TrySubmitError::Closed(t),
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
