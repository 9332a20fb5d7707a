//! In-process service lifecycle: health statuses and discovery
//! registrations kept in concurrent maps.
//!
//! Serves the `/health` endpoints directly. Deployments that announce
//! processors to an external discovery service wrap or replace it.

use dashmap::DashMap;
use docproc_core::{HealthStatus, ServiceLifecycle, ServiceRegistration};
use tracing::info;

/// Tag attached to every processor registration.
pub const PROCESSOR_TAG: &str = "v1-docproc-processor";

/// Health name of the server as a whole, as opposed to a single service.
pub const SERVER_HEALTH: &str = "";

#[derive(Debug, Default)]
pub struct LocalLifecycle {
    health: DashMap<String, HealthStatus>,
    registrations: DashMap<String, ServiceRegistration>,
}

impl LocalLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all active registrations, in no particular order.
    #[must_use]
    pub fn registrations(&self) -> Vec<ServiceRegistration> {
        self.registrations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

impl ServiceLifecycle for LocalLifecycle {
    fn register(&self, registration: &ServiceRegistration) -> anyhow::Result<()> {
        info!(
            service = %registration.service_name,
            id = %registration.unique_service_id,
            address = %registration.address,
            "service registered"
        );
        self.registrations.insert(
            registration.unique_service_id.clone(),
            registration.clone(),
        );
        Ok(())
    }

    fn deregister(&self, unique_service_id: &str) -> anyhow::Result<()> {
        match self.registrations.remove(unique_service_id) {
            Some(_) => {
                info!(id = %unique_service_id, "service deregistered");
                Ok(())
            }
            None => Err(anyhow::anyhow!(
                "no service registered with id {unique_service_id}"
            )),
        }
    }

    fn set_health(&self, service: &str, status: HealthStatus) {
        self.health.insert(service.to_string(), status);
    }

    fn health(&self, service: &str) -> HealthStatus {
        self.health
            .get(service)
            .map_or(HealthStatus::Unknown, |entry| *entry.value())
    }
}
