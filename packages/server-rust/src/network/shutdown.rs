//! Serving state of the server with in-flight request tracking.
//!
//! Uses `ArcSwap` for lock-free state transitions and an atomic counter
//! with RAII guards for in-flight process calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Transport-level serving state.
///
/// State machine: Starting -> Ready -> Draining -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServingState {
    /// Listener not serving yet.
    Starting,
    /// Accepting process calls.
    Ready,
    /// Shutdown signalled; in-flight calls finish, new ones are refused.
    Draining,
    /// Services have been shut down.
    Stopped,
}

impl ServingState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Draining => "draining",
            Self::Stopped => "stopped",
        }
    }
}

/// Tracks the serving state and the number of in-flight process calls.
#[derive(Debug)]
pub struct ShutdownController {
    in_flight: Arc<AtomicU64>,
    state: ArcSwap<ServingState>,
}

impl ShutdownController {
    /// Creates a controller in the `Starting` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(AtomicU64::new(0)),
            state: ArcSwap::from_pointee(ServingState::Starting),
        }
    }

    pub fn set_ready(&self) {
        self.state.store(Arc::new(ServingState::Ready));
    }

    /// Moves to `Draining`; handlers refuse new process calls from now on.
    pub fn trigger_shutdown(&self) {
        self.state.store(Arc::new(ServingState::Draining));
    }

    pub fn set_stopped(&self) {
        self.state.store(Arc::new(ServingState::Stopped));
    }

    #[must_use]
    pub fn state(&self) -> ServingState {
        **self.state.load()
    }

    /// Counts a process call until the returned guard is dropped, even if
    /// the handler panics.
    #[must_use]
    pub fn in_flight_guard(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    #[must_use]
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard that decrements the in-flight counter when dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    in_flight: Arc<AtomicU64>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_starting_ready_draining_stopped() {
        let controller = ShutdownController::new();
        assert_eq!(controller.state(), ServingState::Starting);

        controller.set_ready();
        assert_eq!(controller.state(), ServingState::Ready);

        controller.trigger_shutdown();
        assert_eq!(controller.state(), ServingState::Draining);

        controller.set_stopped();
        assert_eq!(controller.state().as_str(), "stopped");
    }

    #[test]
    fn in_flight_guard_increments_and_decrements() {
        let controller = ShutdownController::new();
        let first = controller.in_flight_guard();
        let second = controller.in_flight_guard();
        assert_eq!(controller.in_flight_count(), 2);

        drop(first);
        assert_eq!(controller.in_flight_count(), 1);
        drop(second);
        assert_eq!(controller.in_flight_count(), 0);
    }
}
