//! Two-phase assembly of the processing graph.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use docproc_core::{ContextManager, EventsClient, Processor, ServiceLifecycle};
use tracing::info;
use uuid::Uuid;

use super::options::ProcessorServerOptions;
use crate::error::ConfigError;
use crate::network::{NetworkServer, ServerBuilder};
use crate::service::{HealthService, ProcessorRunner, ProcessorService, Runner};
use crate::timing::TimingCollector;

/// Options, external clients, and one optional override per graph slot.
///
/// An override replaces the computed value of its slot; everything else is
/// derived in [`build`](Self::build).
pub struct ProcessingBuilder {
    options: ProcessorServerOptions,
    events: Arc<dyn EventsClient>,
    lifecycle: Arc<dyn ServiceLifecycle>,
    processor_name: Option<String>,
    processor_id: Option<String>,
    context_manager: Option<Arc<ContextManager>>,
    processor: Option<Box<dyn Processor>>,
    runner: Option<Arc<dyn Runner>>,
    service: Option<Arc<ProcessorService>>,
    server_builder: Option<ServerBuilder>,
}

impl ProcessingBuilder {
    #[must_use]
    pub fn new(
        options: ProcessorServerOptions,
        events: Arc<dyn EventsClient>,
        lifecycle: Arc<dyn ServiceLifecycle>,
    ) -> Self {
        Self {
            options,
            events,
            lifecycle,
            processor_name: None,
            processor_id: None,
            context_manager: None,
            processor: None,
            runner: None,
            service: None,
            server_builder: None,
        }
    }

    #[must_use]
    pub fn with_processor_name(mut self, name: impl Into<String>) -> Self {
        self.processor_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_processor_id(mut self, id: impl Into<String>) -> Self {
        self.processor_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_context_manager(mut self, context_manager: Arc<ContextManager>) -> Self {
        self.context_manager = Some(context_manager);
        self
    }

    /// Hosts `processor` instead of the one in the options.
    #[must_use]
    pub fn with_processor(mut self, processor: impl Processor + 'static) -> Self {
        self.processor = Some(Box::new(processor));
        self
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn Runner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Uses `service` as is. No timing collector is started for the graph.
    #[must_use]
    pub fn with_service(mut self, service: Arc<ProcessorService>) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn with_server_builder(mut self, server_builder: ServerBuilder) -> Self {
        self.server_builder = Some(server_builder);
        self
    }

    /// Resolves every slot once, in dependency order.
    ///
    /// Binding the processor to its context manager is the only side effect
    /// besides starting the timing collector.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingProcessor`] when neither an override nor the
    ///   options supply a processor
    /// - [`ConfigError::InvalidTimingQueue`] for a zero timing queue capacity
    /// - [`ConfigError::RuntimeUnavailable`] when the timing collector has to
    ///   be started outside a tokio runtime
    /// - [`ConfigError::MissingAddress`] / [`ConfigError::InvalidAddress`]
    ///   for an unusable bind address
    pub fn build(self) -> Result<ProcessingGraph, ConfigError> {
        let Self {
            mut options,
            events,
            lifecycle,
            processor_name,
            processor_id,
            context_manager,
            processor,
            runner,
            service,
            server_builder,
        } = self;

        let mut processor = processor
            .or_else(|| options.processor.take())
            .ok_or(ConfigError::MissingProcessor)?;

        let processor_name =
            processor_name.unwrap_or_else(|| processor.registration_name().to_string());
        let processor_id = processor_id
            .or_else(|| options.identifier.clone())
            .unwrap_or_else(|| processor_name.clone());

        let context_manager = context_manager.unwrap_or_else(|| {
            Arc::new(ContextManager::new(
                processor_id.clone(),
                Arc::clone(&lifecycle),
            ))
        });

        processor.bind(context_manager.binding());
        let processor: Arc<dyn Processor> = Arc::from(processor);

        let runner = runner.unwrap_or_else(|| {
            Arc::new(ProcessorRunner::new(
                Arc::clone(&processor),
                events,
                Arc::clone(&context_manager),
                processor_name.clone(),
                processor_id.clone(),
            ))
        });

        let service = match service {
            Some(service) => service,
            None => {
                if options.timing.queue_capacity == 0 {
                    return Err(ConfigError::InvalidTimingQueue);
                }
                tokio::runtime::Handle::try_current()
                    .map_err(|_| ConfigError::RuntimeUnavailable)?;
                let unique_service_id = options
                    .unique_service_id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().to_string());
                Arc::new(ProcessorService::new(
                    Arc::clone(&lifecycle),
                    Arc::clone(&runner),
                    TimingCollector::start(&options.timing),
                    unique_service_id,
                    options.register,
                ))
            }
        };

        let server_builder = match server_builder {
            Some(builder) => builder,
            None => {
                let address = options
                    .address
                    .as_deref()
                    .ok_or(ConfigError::MissingAddress)?;
                ServerBuilder::for_address(address, options.port)?
                    .with_config(options.network.clone())
            }
        };

        info!(
            processor = %processor_id,
            name = %processor_name,
            address = %server_builder.address(),
            "processing graph built"
        );

        Ok(ProcessingGraph {
            processor_name,
            processor_id,
            context_manager,
            processor,
            runner,
            service,
            server_builder,
            lifecycle,
        })
    }

    /// Shorthand for `build()?.into_server()`.
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`] from [`build`](Self::build); nothing is bound yet.
    pub fn build_server(self) -> Result<ProcessorServer, ConfigError> {
        self.build()?.into_server()
    }
}

impl std::fmt::Debug for ProcessingBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingBuilder")
            .field("options", &self.options)
            .field("processor_name", &self.processor_name)
            .field("processor_id", &self.processor_id)
            .finish_non_exhaustive()
    }
}

/// The resolved, immutable object graph.
pub struct ProcessingGraph {
    processor_name: String,
    processor_id: String,
    context_manager: Arc<ContextManager>,
    processor: Arc<dyn Processor>,
    runner: Arc<dyn Runner>,
    service: Arc<ProcessorService>,
    server_builder: ServerBuilder,
    lifecycle: Arc<dyn ServiceLifecycle>,
}

impl ProcessingGraph {
    #[must_use]
    pub fn processor_name(&self) -> &str {
        &self.processor_name
    }

    #[must_use]
    pub fn processor_id(&self) -> &str {
        &self.processor_id
    }

    #[must_use]
    pub fn context_manager(&self) -> Arc<ContextManager> {
        Arc::clone(&self.context_manager)
    }

    #[must_use]
    pub fn processor(&self) -> Arc<dyn Processor> {
        Arc::clone(&self.processor)
    }

    #[must_use]
    pub fn runner(&self) -> Arc<dyn Runner> {
        Arc::clone(&self.runner)
    }

    #[must_use]
    pub fn service(&self) -> Arc<ProcessorService> {
        Arc::clone(&self.service)
    }

    #[must_use]
    pub fn server_builder(&self) -> &ServerBuilder {
        &self.server_builder
    }

    /// Attaches the service and server-wide health to the server builder.
    ///
    /// Consumes the graph: one graph yields one server.
    ///
    /// # Errors
    ///
    /// Propagates [`ServerBuilder::build`] failures.
    pub fn into_server(self) -> Result<ProcessorServer, ConfigError> {
        let address = self.server_builder.address();
        let server = self
            .server_builder
            .add_service(Arc::clone(&self.service))
            .add_health_service(Arc::new(HealthService::new(self.lifecycle)))
            .build()?;
        Ok(ProcessorServer {
            address,
            server,
            service: self.service,
        })
    }
}

impl std::fmt::Debug for ProcessingGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingGraph")
            .field("processor_name", &self.processor_name)
            .field("processor_id", &self.processor_id)
            .field("server_builder", &self.server_builder)
            .finish_non_exhaustive()
    }
}

/// A processor hosted on a network server.
#[derive(Debug)]
pub struct ProcessorServer {
    address: SocketAddr,
    server: NetworkServer,
    service: Arc<ProcessorService>,
}

impl ProcessorServer {
    /// The configured bind address.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    #[must_use]
    pub fn server(&self) -> &NetworkServer {
        &self.server
    }

    #[must_use]
    pub fn service(&self) -> Arc<ProcessorService> {
        Arc::clone(&self.service)
    }

    /// Binds the listener and returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        self.server.start().await
    }

    /// Serves until `shutdown` resolves, then stops the hosted services.
    ///
    /// # Errors
    ///
    /// See [`NetworkServer::serve`].
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        self.server.serve(shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use docproc_core::{DiscardSink, JsonObject};

    use super::*;
    use crate::events::InMemoryEventsClient;
    use crate::lifecycle::LocalLifecycle;
    use crate::service::ProcessRequest;
    use crate::test_support::SleepyProcessor;

    fn builder(options: ProcessorServerOptions) -> ProcessingBuilder {
        ProcessingBuilder::new(
            options,
            Arc::new(InMemoryEventsClient::new()),
            Arc::new(LocalLifecycle::new()),
        )
    }

    fn request() -> ProcessRequest {
        ProcessRequest {
            event_id: "e1".to_string(),
            params: JsonObject::new(),
        }
    }

    #[tokio::test]
    async fn processor_getter_returns_same_instance() {
        let graph = builder(ProcessorServerOptions::for_processor(
            SleepyProcessor::default(),
        ))
        .build()
        .unwrap();

        assert!(Arc::ptr_eq(&graph.processor(), &graph.processor()));
        assert!(Arc::ptr_eq(&graph.service(), &graph.service()));
        assert!(Arc::ptr_eq(&graph.context_manager(), &graph.context_manager()));
        graph.service().timing().shutdown().await;
    }

    #[tokio::test]
    async fn processor_override_is_what_the_service_invokes() {
        let from_options = SleepyProcessor::default();
        let options_calls = Arc::clone(&from_options.calls);
        let override_processor = SleepyProcessor::default();
        let override_calls = Arc::clone(&override_processor.calls);

        let graph = builder(ProcessorServerOptions::for_processor(from_options))
            .with_processor(override_processor)
            .build()
            .unwrap();
        graph.service().process(request()).await.unwrap();
        graph
            .runner()
            .process(request(), Arc::new(DiscardSink))
            .await
            .unwrap();

        assert_eq!(override_calls.load(Ordering::SeqCst), 2);
        assert_eq!(options_calls.load(Ordering::SeqCst), 0);
        graph.service().timing().shutdown().await;
    }

    #[tokio::test]
    async fn missing_processor_fails_before_binding() {
        let err = builder(ProcessorServerOptions::default())
            .build_server()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingProcessor);
        assert_eq!(err.to_string(), "processor must be specified");
    }

    #[tokio::test]
    async fn missing_address_is_rejected() {
        let mut options = ProcessorServerOptions::for_processor(SleepyProcessor::default());
        options.address = None;
        let err = builder(options).build().unwrap_err();
        assert_eq!(err, ConfigError::MissingAddress);
    }

    #[tokio::test]
    async fn zero_timing_queue_capacity_is_rejected() {
        let mut options = ProcessorServerOptions::for_processor(SleepyProcessor::default());
        options.timing.queue_capacity = 0;
        let err = builder(options).build_server().unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimingQueue);
    }

    #[test]
    fn collector_needs_a_runtime() {
        let err = builder(ProcessorServerOptions::for_processor(
            SleepyProcessor::default(),
        ))
        .build()
        .unwrap_err();
        assert_eq!(err, ConfigError::RuntimeUnavailable);
    }

    #[tokio::test]
    async fn processor_id_defaults_to_name_and_binding_is_applied() {
        let processor = SleepyProcessor::default();
        let bound = Arc::clone(&processor.binding);

        let graph = builder(ProcessorServerOptions::for_processor(processor))
            .build()
            .unwrap();

        assert_eq!(graph.processor_name(), "sleepy");
        assert_eq!(graph.processor_id(), "sleepy");
        assert_eq!(graph.context_manager().processor_id(), "sleepy");
        assert_eq!(bound.lock().as_deref(), Some("sleepy"));
        graph.service().timing().shutdown().await;
    }

    #[tokio::test]
    async fn identifier_and_overrides_take_precedence() {
        let mut options = ProcessorServerOptions::for_processor(SleepyProcessor::default());
        options.identifier = Some("sleepy-7".to_string());
        options.unique_service_id = Some("svc-1".to_string());

        let graph = builder(options)
            .with_processor_name("napper")
            .build()
            .unwrap();
        assert_eq!(graph.processor_name(), "napper");
        assert_eq!(graph.processor_id(), "sleepy-7");
        assert_eq!(graph.service().identity().name, "napper");
        assert_eq!(graph.service().unique_service_id(), "svc-1");
        graph.service().timing().shutdown().await;

        let graph = builder(ProcessorServerOptions::for_processor(
            SleepyProcessor::default(),
        ))
        .with_processor_id("explicit")
        .build()
        .unwrap();
        assert_eq!(graph.processor_id(), "explicit");
        graph.service().timing().shutdown().await;
    }

    #[tokio::test]
    async fn into_server_keeps_configured_address() {
        let mut options = ProcessorServerOptions::for_processor(SleepyProcessor::default());
        options.port = 9095;
        let server = builder(options).build_server().unwrap();

        assert_eq!(server.address(), "127.0.0.1:9095".parse().unwrap());
        assert_eq!(server.server().registry().len(), 2);
        server.service().timing().shutdown().await;
    }
}
