//! Start/stop timer with cumulative elapsed time.
//!
//! A stopwatch can be cycled through any number of start/stop pairs; each
//! `stop()` adds the finished interval to the running total. Stopwatches
//! created from a [`ProcessingScope`] additionally report every finished
//! interval against the scope's active context.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::context::ProcessingScope;
use crate::error::UsageError;

/// Lifecycle state of a [`Stopwatch`].
///
/// State machine: Unstarted -> Running <-> Stopped, `reset()` -> Unstarted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchState {
    Unstarted,
    Running,
    Stopped,
}

pub struct Stopwatch {
    label: String,
    state: StopwatchState,
    accumulated: Duration,
    running_since: Option<Instant>,
    clock: Arc<dyn Clock>,
    scope: Option<ProcessingScope>,
}

impl Stopwatch {
    /// A stopwatch that is not attached to any scope and has not started.
    #[must_use]
    pub fn unstarted(label: impl Into<String>) -> Self {
        Self::with_clock(label, Arc::new(SystemClock))
    }

    /// A stopwatch that is not attached to any scope and is already running.
    #[must_use]
    pub fn started(label: impl Into<String>) -> Self {
        let mut stopwatch = Self::unstarted(label);
        stopwatch.begin();
        stopwatch
    }

    /// An unstarted, unattached stopwatch reading time from `clock`.
    #[must_use]
    pub fn with_clock(label: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            label: label.into(),
            state: StopwatchState::Unstarted,
            accumulated: Duration::ZERO,
            running_since: None,
            clock,
            scope: None,
        }
    }

    pub(crate) fn in_scope(label: impl Into<String>, scope: ProcessingScope) -> Self {
        let mut stopwatch = Self::with_clock(label, scope.clock());
        stopwatch.scope = Some(scope);
        stopwatch
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn state(&self) -> StopwatchState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == StopwatchState::Running
    }

    /// Starts a new interval.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::AlreadyRunning`] if the stopwatch is running.
    pub fn start(&mut self) -> Result<(), UsageError> {
        if self.is_running() {
            return Err(UsageError::AlreadyRunning {
                label: self.label.clone(),
            });
        }
        self.begin();
        Ok(())
    }

    /// Ends the current interval, adds it to the total and returns its length.
    ///
    /// If the stopwatch belongs to a scope with an active context, the
    /// interval is recorded as a timing sample under that context.
    ///
    /// # Errors
    ///
    /// Returns [`UsageError::NotRunning`] if the stopwatch is not running.
    pub fn stop(&mut self) -> Result<Duration, UsageError> {
        if !self.is_running() {
            return Err(UsageError::NotRunning {
                label: self.label.clone(),
            });
        }
        let now = self.clock.now();
        let since = self.running_since.take().unwrap_or(now);
        let interval = now.saturating_duration_since(since);
        self.accumulated += interval;
        self.state = StopwatchState::Stopped;

        if let Some(scope) = &self.scope {
            scope.record(&self.label, interval);
        }
        Ok(interval)
    }

    /// Total measured time, including the live interval while running.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(since) if self.is_running() => {
                self.accumulated + self.clock.now().saturating_duration_since(since)
            }
            _ => self.accumulated,
        }
    }

    /// Returns to the unstarted state with nothing accumulated. A running
    /// interval is discarded without being recorded.
    pub fn reset(&mut self) {
        self.state = StopwatchState::Unstarted;
        self.accumulated = Duration::ZERO;
        self.running_since = None;
    }

    pub(crate) fn begin(&mut self) {
        self.running_since = Some(self.clock.now());
        self.state = StopwatchState::Running;
    }
}

impl fmt::Debug for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stopwatch")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("accumulated", &self.accumulated)
            .finish_non_exhaustive()
    }
}
