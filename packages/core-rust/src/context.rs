//! Processing contexts: the per-request stack of named operations that
//! timing samples are attributed to.
//!
//! Context state is never ambient. The runner creates one
//! [`ProcessingScope`] per request from the shared [`ContextManager`] and
//! passes it to the processor explicitly, so a context entered by one
//! request is invisible to every other request.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use tracing::error;

use crate::clock::{Clock, SystemClock};
use crate::error::UsageError;
use crate::stopwatch::Stopwatch;
use crate::timing::{DiscardSink, TimingKey, TimingSample, TimingSink};
use crate::traits::ServiceLifecycle;
use crate::types::HealthStatus;

/// A named operation that is currently active within a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingContext {
    pub label: String,
    pub entered_at: Instant,
}

// ---------------------------------------------------------------------------
// ContextManager
// ---------------------------------------------------------------------------

/// Shared per-processor factory for request scopes and processor bindings.
pub struct ContextManager {
    processor_id: String,
    lifecycle: Arc<dyn ServiceLifecycle>,
    clock: Arc<dyn Clock>,
}

impl ContextManager {
    #[must_use]
    pub fn new(processor_id: impl Into<String>, lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        Self {
            processor_id: processor_id.into(),
            lifecycle,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the clock used by scopes created from this manager.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn processor_id(&self) -> &str {
        &self.processor_id
    }

    /// The binding handed to the processor when the graph is assembled.
    #[must_use]
    pub fn binding(&self) -> ProcessorBinding {
        ProcessorBinding {
            processor_id: self.processor_id.clone(),
            lifecycle: Arc::clone(&self.lifecycle),
        }
    }

    /// Creates an empty scope for one request. Samples recorded in it are
    /// forwarded to `sink`.
    #[must_use]
    pub fn scope(&self, sink: Arc<dyn TimingSink>) -> ProcessingScope {
        ProcessingScope::with_clock(sink, Arc::clone(&self.clock))
    }
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("processor_id", &self.processor_id)
            .finish_non_exhaustive()
    }
}

/// Processor-facing view of its hosting context: its identifier and the
/// health it reports.
#[derive(Clone)]
pub struct ProcessorBinding {
    processor_id: String,
    lifecycle: Arc<dyn ServiceLifecycle>,
}

impl ProcessorBinding {
    #[must_use]
    pub fn processor_id(&self) -> &str {
        &self.processor_id
    }

    /// Reports the processor's own health to health checks.
    pub fn set_health(&self, status: HealthStatus) {
        self.lifecycle.set_health(&self.processor_id, status);
    }

    #[must_use]
    pub fn health(&self) -> HealthStatus {
        self.lifecycle.health(&self.processor_id)
    }
}

impl fmt::Debug for ProcessorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorBinding")
            .field("processor_id", &self.processor_id)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ProcessingScope
// ---------------------------------------------------------------------------

struct Frame {
    id: u64,
    context: ProcessingContext,
}

struct ScopeState {
    clock: Arc<dyn Clock>,
    sink: Arc<dyn TimingSink>,
    frames: Mutex<Vec<Frame>>,
    samples: Mutex<Vec<TimingSample>>,
    next_id: AtomicU64,
}

/// Context stack of a single request.
///
/// Cloning is cheap and yields a handle to the same stack; clones must stay
/// within the request that created the scope.
#[derive(Clone)]
pub struct ProcessingScope {
    state: Arc<ScopeState>,
}

impl ProcessingScope {
    #[must_use]
    pub fn new(sink: Arc<dyn TimingSink>) -> Self {
        Self::with_clock(sink, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(sink: Arc<dyn TimingSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(ScopeState {
                clock,
                sink,
                frames: Mutex::new(Vec::new()),
                samples: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// A scope whose samples are kept locally but not forwarded anywhere.
    #[must_use]
    pub fn detached() -> Self {
        Self::new(Arc::new(DiscardSink))
    }

    /// Pushes a new active context. It stays active until the returned
    /// guard is dropped or passed to [`exit`](Self::exit).
    #[must_use = "the context is exited as soon as the guard is dropped"]
    pub fn enter(&self, label: impl Into<String>) -> ContextGuard {
        let id = self.state.next_id.fetch_add(1, Ordering::Relaxed);
        let context = ProcessingContext {
            label: label.into(),
            entered_at: self.state.clock.now(),
        };
        let label = context.label.clone();
        self.state.frames.lock().push(Frame { id, context });
        ContextGuard {
            scope: self.clone(),
            id,
            label,
            released: false,
        }
    }

    /// Exits the context held by `guard`, returning it.
    ///
    /// # Errors
    ///
    /// Returns [`ExitError`] with [`UsageError::OutOfOrderExit`] if `guard`
    /// is not the active context of this scope. The stack is left unchanged
    /// and the guard is handed back so it can still be released in order.
    pub fn exit(&self, mut guard: ContextGuard) -> Result<ProcessingContext, ExitError> {
        let mut frames = self.state.frames.lock();
        let is_top = Arc::ptr_eq(&self.state, &guard.scope.state)
            && frames.last().is_some_and(|top| top.id == guard.id);
        if is_top {
            if let Some(frame) = frames.pop() {
                guard.released = true;
                return Ok(frame.context);
            }
        }
        let error = UsageError::OutOfOrderExit {
            label: guard.label.clone(),
            active: frames
                .last()
                .map(|f| f.context.label.clone())
                .unwrap_or_default(),
        };
        drop(frames);
        Err(ExitError { error, guard })
    }

    /// The active (innermost) context, if any.
    #[must_use]
    pub fn current(&self) -> Option<ProcessingContext> {
        self.state.frames.lock().last().map(|f| f.context.clone())
    }

    /// Number of contexts currently entered.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.frames.lock().len()
    }

    /// A stopwatch that is already running.
    #[must_use]
    pub fn started_stopwatch(&self, label: impl Into<String>) -> Stopwatch {
        let mut stopwatch = Stopwatch::in_scope(label, self.clone());
        stopwatch.begin();
        stopwatch
    }

    /// A stopwatch that starts on its first [`Stopwatch::start`].
    #[must_use]
    pub fn unstarted_stopwatch(&self, label: impl Into<String>) -> Stopwatch {
        Stopwatch::in_scope(label, self.clone())
    }

    /// Every sample recorded in this scope so far, in recording order.
    #[must_use]
    pub fn samples(&self) -> Vec<TimingSample> {
        self.state.samples.lock().clone()
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.state.clock)
    }

    /// Attributes a completed interval to the active context. Without an
    /// active context nothing is recorded.
    pub(crate) fn record(&self, stopwatch: &str, interval: Duration) {
        let Some(context) = self.current() else {
            return;
        };
        let sample = TimingSample {
            key: TimingKey::new(context.label, stopwatch),
            duration: interval,
            observed_at: SystemTime::now(),
        };
        self.state.samples.lock().push(sample.clone());
        self.state.sink.submit(sample);
    }
}

impl fmt::Debug for ProcessingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingScope")
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ContextGuard
// ---------------------------------------------------------------------------

/// A refused [`ProcessingScope::exit`]. Carries the guard back to the caller.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExitError {
    error: UsageError,
    guard: ContextGuard,
}

impl ExitError {
    #[must_use]
    pub fn usage_error(&self) -> &UsageError {
        &self.error
    }

    /// The guard whose exit was refused. Its context is still entered.
    #[must_use]
    pub fn into_guard(self) -> ContextGuard {
        self.guard
    }
}


/// RAII handle to an entered context. Dropping it exits the context.
///
/// Dropping a guard that is not the active context is a usage error and
/// panics, unless the thread is already unwinding.
pub struct ContextGuard {
    scope: ProcessingScope,
    id: u64,
    label: String,
    released: bool,
}

impl ContextGuard {
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("label", &self.label)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut frames = self.scope.state.frames.lock();
        if frames.last().is_some_and(|top| top.id == self.id) {
            frames.pop();
            return;
        }
        let active = frames
            .last()
            .map(|f| f.context.label.clone())
            .unwrap_or_default();
        frames.retain(|f| f.id != self.id);
        drop(frames);

        if !std::thread::panicking() {
            error!(label = %self.label, active = %active, "context released out of order");
            panic!(
                "context `{}` released while `{}` is the active context",
                self.label, active
            );
        }
    }
}
