use async_trait::async_trait;

use crate::context::{ProcessingScope, ProcessorBinding};
use crate::types::{Event, HealthStatus, JsonObject, ServiceRegistration};

/// User-supplied unit of processing logic hosted by the server.
///
/// `process` is invoked by the runner inside an active processing context;
/// stopwatches created from `scope` report their intervals against it.
#[async_trait]
pub trait Processor: Send + Sync {
    /// Declared registration name, used when no explicit name is configured.
    fn registration_name(&self) -> &str;

    /// Called once while the processing graph is assembled, before the
    /// processor is shared between requests. Default is a no-op.
    fn bind(&mut self, _binding: ProcessorBinding) {}

    /// Process one event and return the result fields.
    async fn process(
        &self,
        event: &Event,
        params: &JsonObject,
        scope: &ProcessingScope,
    ) -> anyhow::Result<JsonObject>;
}

/// Client of the events service that stores documents and labels.
/// Implementations: in-memory (tests, local runs); remote clients live outside this workspace.
#[async_trait]
pub trait EventsClient: Send + Sync {
    /// Open (lease) an event, creating it if it does not exist.
    async fn open_event(&self, event_id: &str) -> anyhow::Result<Event>;

    /// Release the lease taken by `open_event`.
    async fn close_event(&self, event_id: &str) -> anyhow::Result<()>;
}

/// Process-wide registration and health-check plumbing.
pub trait ServiceLifecycle: Send + Sync {
    /// Announce a service instance for discovery.
    fn register(&self, registration: &ServiceRegistration) -> anyhow::Result<()>;

    /// Withdraw a previously registered instance.
    fn deregister(&self, unique_service_id: &str) -> anyhow::Result<()>;

    /// Set the health reported for `service`.
    fn set_health(&self, service: &str, status: HealthStatus);

    /// Health reported for `service`; `Unknown` if never set.
    fn health(&self, service: &str) -> HealthStatus;
}
