//! Server-wide health reporting.
//!
//! Marks the server as a whole (the empty health name) serving once every
//! earlier-registered service has started, and not serving on shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use docproc_core::{HealthStatus, ServiceLifecycle};

use super::registry::{ManagedService, ServiceContext};
use crate::lifecycle::SERVER_HEALTH;

pub struct HealthService {
    lifecycle: Arc<dyn ServiceLifecycle>,
}

impl HealthService {
    #[must_use]
    pub fn new(lifecycle: Arc<dyn ServiceLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Health of `service`, or of the whole server for the empty name.
    #[must_use]
    pub fn status(&self, service: &str) -> HealthStatus {
        self.lifecycle.health(service)
    }
}

impl std::fmt::Debug for HealthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthService")
            .field("server", &self.status(SERVER_HEALTH))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ManagedService for HealthService {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn init(&self, _ctx: &ServiceContext) -> anyhow::Result<()> {
        self.lifecycle.set_health(SERVER_HEALTH, HealthStatus::Serving);
        Ok(())
    }

    async fn shutdown(&self, _terminate: bool) -> anyhow::Result<()> {
        self.lifecycle
            .set_health(SERVER_HEALTH, HealthStatus::NotServing);
        Ok(())
    }
}
