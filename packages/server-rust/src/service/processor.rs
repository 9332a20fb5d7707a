//! The processor service: what the transport calls into.
//!
//! Wraps a [`Runner`] with the timing collector, request metrics, and the
//! processor's registration and health lifecycle.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use docproc_core::{HealthStatus, ProcessorIdentity, ServiceLifecycle, ServiceRegistration};
use serde::Serialize;
use tracing::{info, warn};

use super::registry::{ManagedService, ServiceContext};
use super::runner::{ProcessRequest, ProcessResponse, ProcessingError, Runner};
use crate::lifecycle::PROCESSOR_TAG;
use crate::timing::{TimingCollector, TimingSummary};

/// Static description of the hosted processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorInfo {
    pub name: String,
    pub id: String,
    pub unique_service_id: String,
}

pub struct ProcessorService {
    lifecycle: Arc<dyn ServiceLifecycle>,
    runner: Arc<dyn Runner>,
    timing: TimingCollector,
    unique_service_id: String,
    register: bool,
}

impl ProcessorService {
    #[must_use]
    pub fn new(
        lifecycle: Arc<dyn ServiceLifecycle>,
        runner: Arc<dyn Runner>,
        timing: TimingCollector,
        unique_service_id: impl Into<String>,
        register: bool,
    ) -> Self {
        Self {
            lifecycle,
            runner,
            timing,
            unique_service_id: unique_service_id.into(),
            register,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &ProcessorIdentity {
        self.runner.identity()
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Arc<dyn ServiceLifecycle> {
        &self.lifecycle
    }

    #[must_use]
    pub fn timing(&self) -> &TimingCollector {
        &self.timing
    }

    #[must_use]
    pub fn unique_service_id(&self) -> &str {
        &self.unique_service_id
    }

    #[must_use]
    pub fn info(&self) -> ProcessorInfo {
        let identity = self.identity();
        ProcessorInfo {
            name: identity.name.clone(),
            id: identity.id.clone(),
            unique_service_id: self.unique_service_id.clone(),
        }
    }

    /// Runs one request, feeding its timings to the collector.
    ///
    /// # Errors
    ///
    /// Propagates the runner's [`ProcessingError`].
    pub async fn process(
        &self,
        request: ProcessRequest,
    ) -> Result<ProcessResponse, ProcessingError> {
        let processor = self.identity().id.clone();
        let started = Instant::now();
        let result = self
            .runner
            .process(request, Arc::new(self.timing.handle()))
            .await;

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(
            "docproc_process_requests_total",
            "processor" => processor.clone(),
            "outcome" => outcome
        )
        .increment(1);
        metrics::histogram!("docproc_process_duration_seconds", "processor" => processor)
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            warn!(error = %e, "process call failed");
        }
        result
    }

    /// Aggregated timings of every call served so far.
    ///
    /// # Errors
    ///
    /// Returns an error once the service has been shut down.
    pub async fn timing_summary(&self) -> anyhow::Result<TimingSummary> {
        self.timing.summary().await
    }
}

impl std::fmt::Debug for ProcessorService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorService")
            .field("identity", self.identity())
            .field("unique_service_id", &self.unique_service_id)
            .field("register", &self.register)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ManagedService for ProcessorService {
    fn name(&self) -> &'static str {
        "processor"
    }

    async fn init(&self, ctx: &ServiceContext) -> anyhow::Result<()> {
        let id = self.identity().id.clone();
        if self.register {
            self.lifecycle.register(&ServiceRegistration {
                service_name: id.clone(),
                unique_service_id: self.unique_service_id.clone(),
                address: ctx.address.to_string(),
                tags: vec![PROCESSOR_TAG.to_string()],
            })?;
        }
        self.lifecycle.set_health(&id, HealthStatus::Serving);
        info!(processor = %id, address = %ctx.address, "processor service started");
        Ok(())
    }

    async fn shutdown(&self, terminate: bool) -> anyhow::Result<()> {
        let id = self.identity().id.clone();
        self.lifecycle.set_health(&id, HealthStatus::NotServing);
        let deregistered = if self.register {
            self.lifecycle.deregister(&self.unique_service_id)
        } else {
            Ok(())
        };
        if !terminate {
            self.timing.shutdown().await;
        }
        info!(processor = %id, "processor service stopped");
        deregistered
    }
}

#[cfg(test)]
mod tests {
    use docproc_core::{ContextManager, TimingKey};

    use super::*;
    use crate::events::InMemoryEventsClient;
    use crate::lifecycle::LocalLifecycle;
    use crate::service::runner::ProcessorRunner;
    use crate::test_support::SleepyProcessor;
    use crate::timing::TimingConfig;

    fn service(lifecycle: Arc<LocalLifecycle>, register: bool) -> ProcessorService {
        let manager = Arc::new(ContextManager::new("sleepy", lifecycle.clone()));
        let runner = ProcessorRunner::new(
            Arc::new(SleepyProcessor::default()),
            Arc::new(InMemoryEventsClient::new()),
            manager,
            "sleepy",
            "sleepy",
        );
        ProcessorService::new(
            lifecycle,
            Arc::new(runner),
            TimingCollector::start(&TimingConfig::default()),
            "sleepy-0001",
            register,
        )
    }

    fn ctx() -> ServiceContext {
        ServiceContext {
            address: "127.0.0.1:9090".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn process_feeds_timing_collector() {
        let service = service(Arc::new(LocalLifecycle::new()), false);
        service
            .process(ProcessRequest {
                event_id: "e1".to_string(),
                params: docproc_core::JsonObject::new(),
            })
            .await
            .unwrap();

        let summary = service.timing_summary().await.unwrap();
        assert_eq!(summary.get(&TimingKey::new("sleepy", "nap")).unwrap().count, 1);
        assert!(summary
            .get(&TimingKey::new("sleepy", "process_method"))
            .is_some());
    }

    #[tokio::test]
    async fn init_registers_and_marks_serving() {
        let lifecycle = Arc::new(LocalLifecycle::new());
        let service = service(lifecycle.clone(), true);

        service.init(&ctx()).await.unwrap();
        assert_eq!(lifecycle.health("sleepy"), HealthStatus::Serving);
        let registrations = lifecycle.registrations();
        assert_eq!(registrations.len(), 1);
        assert_eq!(registrations[0].unique_service_id, "sleepy-0001");
        assert_eq!(registrations[0].address, "127.0.0.1:9090");

        service.shutdown(false).await.unwrap();
        assert_eq!(lifecycle.health("sleepy"), HealthStatus::NotServing);
        assert!(lifecycle.registrations().is_empty());
        assert!(!service.timing().is_running());
    }

    #[tokio::test]
    async fn init_without_register_flag_skips_registration() {
        let lifecycle = Arc::new(LocalLifecycle::new());
        let service = service(lifecycle.clone(), false);

        service.init(&ctx()).await.unwrap();
        assert!(lifecycle.registrations().is_empty());
        assert_eq!(lifecycle.health("sleepy"), HealthStatus::Serving);
        service.shutdown(false).await.unwrap();
    }

    #[tokio::test]
    async fn info_reports_identity() {
        let service = service(Arc::new(LocalLifecycle::new()), false);
        assert_eq!(
            service.info(),
            ProcessorInfo {
                name: "sleepy".to_string(),
                id: "sleepy".to_string(),
                unique_service_id: "sleepy-0001".to_string(),
            }
        );
    }
}
