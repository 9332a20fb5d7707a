//! Server builder and network server with deferred startup.
//!
//! `ServerBuilder::build()` assembles the router and service registry
//! without touching the network, `start()` binds the TCP listener, and
//! `serve()` runs the service lifecycle around the accept loop.

use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    health_handler, info_handler, liveness_handler, process_handler, readiness_handler,
    service_health_handler, stats_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::error::ConfigError;
use crate::service::{HealthService, ProcessorService, ServiceContext, ServiceRegistry};

/// Collects the address, transport settings, and hosted services.
#[derive(Debug)]
pub struct ServerBuilder {
    address: SocketAddr,
    config: NetworkConfig,
    service: Option<Arc<ProcessorService>>,
    health: Option<Arc<HealthService>>,
}

impl ServerBuilder {
    /// Resolves `host:port` into a bind address.
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingAddress`] for an empty host and
    /// [`ConfigError::InvalidAddress`] when the host does not resolve.
    pub fn for_address(host: &str, port: u16) -> Result<Self, ConfigError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(ConfigError::MissingAddress);
        }
        let invalid = |reason: String| ConfigError::InvalidAddress {
            address: format!("{host}:{port}"),
            reason,
        };
        let address = (host, port)
            .to_socket_addrs()
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("host resolved to no addresses".to_string()))?;
        Ok(Self::for_socket_addr(address))
    }

    #[must_use]
    pub fn for_socket_addr(address: SocketAddr) -> Self {
        Self {
            address,
            config: NetworkConfig::default(),
            service: None,
            health: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    #[must_use]
    pub fn add_service(mut self, service: Arc<ProcessorService>) -> Self {
        self.service = Some(service);
        self
    }

    #[must_use]
    pub fn add_health_service(mut self, health: Arc<HealthService>) -> Self {
        self.health = Some(health);
        self
    }

    /// Assembles the router and registry. Nothing is bound yet.
    ///
    /// Routes:
    /// - `POST /v1/processors/{id}/process` -- process one event
    /// - `GET /v1/processors/{id}/info` -- processor identity
    /// - `GET /v1/processors/{id}/stats` -- aggregated timings
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- Kubernetes liveness check
    /// - `GET /health/ready` -- Kubernetes readiness check
    /// - `GET /health/{service}` -- lifecycle status of one service
    ///
    /// # Errors
    ///
    /// [`ConfigError::MissingService`] if no processor service was added.
    pub fn build(self) -> Result<NetworkServer, ConfigError> {
        let service = self.service.ok_or(ConfigError::MissingService)?;
        let shutdown = Arc::new(ShutdownController::new());

        // Health registers last: the server reports serving only after the
        // processor is up, and stops reporting it first on the way down.
        let registry = ServiceRegistry::new();
        registry.register(Arc::clone(&service));
        if let Some(health) = self.health {
            registry.register(health);
        }

        let state = AppState {
            service,
            shutdown: Arc::clone(&shutdown),
            start_time: Instant::now(),
        };
        let router = Router::new()
            .route("/v1/processors/{id}/process", post(process_handler))
            .route("/v1/processors/{id}/info", get(info_handler))
            .route("/v1/processors/{id}/stats", get(stats_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/health/{service}", get(service_health_handler))
            .layer(build_http_layers(&self.config))
            .with_state(state);

        Ok(NetworkServer {
            address: self.address,
            router,
            registry,
            shutdown,
            listener: None,
        })
    }
}

/// A built server: router, hosted services, and serving state.
pub struct NetworkServer {
    address: SocketAddr,
    router: Router,
    registry: ServiceRegistry,
    shutdown: Arc<ShutdownController>,
    listener: Option<TcpListener>,
}

impl NetworkServer {
    /// The configured bind address.
    #[must_use]
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// A clone of the fully layered router, for driving requests in-process.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Binds the TCP listener to the configured address.
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(self.address).await?;
        let local = listener.local_addr()?;
        info!(address = %local, "TCP listener bound");
        self.listener = Some(listener);
        Ok(local)
    }

    /// Serves until `shutdown` resolves. Binds first if `start()` was not
    /// called.
    ///
    /// 1. Initializes hosted services in registration order
    /// 2. Serving state moves to Ready
    /// 3. On the shutdown signal the state moves to Draining and in-flight
    ///    requests finish
    /// 4. Hosted services shut down in reverse order; state moves to Stopped
    ///
    /// # Errors
    ///
    /// Returns service init failures, fatal I/O errors, and the first service
    /// shutdown failure.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        if self.listener.is_none() {
            self.start().await?;
        }
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("listener was not bound");
        };
        let ctx = ServiceContext {
            address: listener.local_addr()?,
        };

        if let Err(e) = self.registry.init_all(&ctx).await {
            warn!(error = %e, "service init failed; shutting down");
            let _ = self.registry.shutdown_all(true).await;
            self.shutdown.set_stopped();
            return Err(e);
        }
        self.shutdown.set_ready();
        info!(address = %ctx.address, "serving");

        let draining = Arc::clone(&self.shutdown);
        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                draining.trigger_shutdown();
                info!("shutdown signalled, draining in-flight requests");
            })
            .await;

        self.shutdown.trigger_shutdown();
        let stopped = self.registry.shutdown_all(false).await;
        self.shutdown.set_stopped();
        info!("server stopped");

        served?;
        stopped
    }
}

impl std::fmt::Debug for NetworkServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkServer")
            .field("address", &self.address)
            .field("state", &self.shutdown.state())
            .field("services", &self.registry.len())
            .finish_non_exhaustive()
    }
}
