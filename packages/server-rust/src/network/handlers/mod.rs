//! HTTP handler definitions for the processor server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod health;
pub mod processor;

pub use health::{health_handler, liveness_handler, readiness_handler, service_health_handler};
pub use processor::{info_handler, process_handler, stats_handler, ApiError};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::ProcessorService;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The hosted processor service.
    pub service: Arc<ProcessorService>,
    /// Serving state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) mod test_state {
    use std::sync::Arc;
    use std::time::Instant;

    use docproc_core::{ContextManager, Event};

    use super::AppState;
    use crate::events::InMemoryEventsClient;
    use crate::lifecycle::LocalLifecycle;
    use crate::network::ShutdownController;
    use crate::service::{ProcessorRunner, ProcessorService};
    use crate::test_support::SleepyProcessor;
    use crate::timing::{TimingCollector, TimingConfig};

    pub(crate) fn app_state() -> (AppState, Arc<LocalLifecycle>) {
        let lifecycle = Arc::new(LocalLifecycle::new());
        let events = Arc::new(InMemoryEventsClient::new());
        events.insert(Event::new("e1"));
        let runner = ProcessorRunner::new(
            Arc::new(SleepyProcessor::default()),
            events,
            Arc::new(ContextManager::new("sleepy", lifecycle.clone())),
            "sleepy",
            "sleepy",
        );
        let service = ProcessorService::new(
            lifecycle.clone(),
            Arc::new(runner),
            TimingCollector::start(&TimingConfig::default()),
            "sleepy-0001",
            false,
        );
        let state = AppState {
            service: Arc::new(service),
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        };
        (state, lifecycle)
    }
}
