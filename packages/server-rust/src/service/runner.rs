//! Runner: bridges a transport-level process call to the hosted processor.
//!
//! For each call the runner leases the event, opens a fresh processing
//! scope, enters a context labelled with the processor id, and times the
//! whole `process` call with a `process_method` stopwatch. The context and
//! the event lease are released on every exit path.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docproc_core::{
    ContextManager, EventsClient, JsonObject, Processor, ProcessorIdentity, TimingSink,
    UsageError,
};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

/// Label of the stopwatch wrapping every `process` call.
pub const PROCESS_METHOD: &str = "process_method";

/// A request to process one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub event_id: String,
    #[serde(default)]
    pub params: JsonObject,
}

/// Result fields plus the timings recorded while producing them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessResponse {
    pub event_id: String,
    pub result: JsonObject,
    /// Total time per `"context:stopwatch"` key within this call.
    #[serde(rename = "timing_info_ms", serialize_with = "durations_as_millis")]
    pub timing_info: BTreeMap<String, Duration>,
}

#[allow(clippy::cast_precision_loss)]
fn durations_as_millis<S>(
    timings: &BTreeMap<String, Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(
        timings
            .iter()
            .map(|(key, d)| (key, d.as_nanos() as f64 / 1_000_000.0)),
    )
}

/// Errors from running a processor.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("events client failed: {0}")]
    EventsClient(#[source] anyhow::Error),
    #[error("processor failed: {0}")]
    Processor(#[source] anyhow::Error),
    #[error(transparent)]
    Usage(#[from] UsageError),
}

/// Invokes processor logic for transport-level calls.
#[async_trait]
pub trait Runner: Send + Sync {
    fn identity(&self) -> &ProcessorIdentity;

    /// Process one request; samples recorded during the call go to `timing`.
    async fn process(
        &self,
        request: ProcessRequest,
        timing: Arc<dyn TimingSink>,
    ) -> Result<ProcessResponse, ProcessingError>;
}

/// Default runner around a single bound processor.
pub struct ProcessorRunner {
    processor: Arc<dyn Processor>,
    events: Arc<dyn EventsClient>,
    context_manager: Arc<ContextManager>,
    identity: ProcessorIdentity,
}

impl ProcessorRunner {
    #[must_use]
    pub fn new(
        processor: Arc<dyn Processor>,
        events: Arc<dyn EventsClient>,
        context_manager: Arc<ContextManager>,
        name: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            processor,
            events,
            context_manager,
            identity: ProcessorIdentity {
                name: name.into(),
                id: id.into(),
            },
        }
    }
}

impl fmt::Debug for ProcessorRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRunner")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Runner for ProcessorRunner {
    fn identity(&self) -> &ProcessorIdentity {
        &self.identity
    }

    async fn process(
        &self,
        request: ProcessRequest,
        timing: Arc<dyn TimingSink>,
    ) -> Result<ProcessResponse, ProcessingError> {
        let event = self
            .events
            .open_event(&request.event_id)
            .await
            .map_err(ProcessingError::EventsClient)?;
        let lease = EventLease::new(Arc::clone(&self.events), &event.event_id);

        let scope = self.context_manager.scope(timing);
        let (result, stopped) = {
            let _context = scope.enter(self.identity.id.as_str());
            let mut stopwatch = scope.started_stopwatch(PROCESS_METHOD);
            let result = self
                .processor
                .process(&event, &request.params, &scope)
                .await;
            (result, stopwatch.stop())
        };

        lease.release().await;

        let result = result.map_err(ProcessingError::Processor)?;
        stopped?;

        let mut timing_info = BTreeMap::new();
        for sample in scope.samples() {
            *timing_info
                .entry(sample.key.to_string())
                .or_insert(Duration::ZERO) += sample.duration;
        }
        debug!(
            processor = %self.identity.id,
            event_id = %event.event_id,
            timings = timing_info.len(),
            "event processed"
        );

        Ok(ProcessResponse {
            event_id: event.event_id,
            result,
            timing_info,
        })
    }
}

/// An open event that must be closed exactly once.
///
/// If the call is dropped before [`release`](Self::release) completes (a
/// request timeout, a client disconnect), the close is spawned on the
/// current runtime instead.
struct EventLease {
    events: Arc<dyn EventsClient>,
    event_id: String,
    released: bool,
}

impl EventLease {
    fn new(events: Arc<dyn EventsClient>, event_id: &str) -> Self {
        Self {
            events,
            event_id: event_id.to_string(),
            released: false,
        }
    }

    async fn release(mut self) {
        close_logged(self.events.as_ref(), &self.event_id).await;
        self.released = true;
    }
}

impl Drop for EventLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let events = Arc::clone(&self.events);
        let event_id = std::mem::take(&mut self.event_id);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    close_logged(events.as_ref(), &event_id).await;
                });
            }
            Err(_) => {
                warn!(event_id = %event_id, "no runtime to release abandoned event");
            }
        }
    }
}

async fn close_logged(events: &dyn EventsClient, event_id: &str) {
    if let Err(e) = events.close_event(event_id).await {
        warn!(event_id = %event_id, error = %e, "failed to release event");
    }
}
