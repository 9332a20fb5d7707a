//! Startup options for a processor server.

use std::fmt;

use docproc_core::Processor;

use crate::network::NetworkConfig;
use crate::timing::TimingConfig;

/// Everything needed to host one processor.
pub struct ProcessorServerOptions {
    /// The processor to host. Required.
    pub processor: Option<Box<dyn Processor>>,
    /// Processor id; defaults to the processor's registration name.
    pub identifier: Option<String>,
    /// Host to bind. Required.
    pub address: Option<String>,
    /// Port to bind; 0 lets the OS pick.
    pub port: u16,
    /// Id used when registering; defaults to a fresh UUID.
    pub unique_service_id: Option<String>,
    /// Whether to register with the service lifecycle on start.
    pub register: bool,
    pub timing: TimingConfig,
    pub network: NetworkConfig,
}

impl ProcessorServerOptions {
    /// Options hosting `processor` on `127.0.0.1` with an OS-assigned port.
    #[must_use]
    pub fn for_processor(processor: impl Processor + 'static) -> Self {
        Self {
            processor: Some(Box::new(processor)),
            ..Self::default()
        }
    }
}

impl Default for ProcessorServerOptions {
    fn default() -> Self {
        Self {
            processor: None,
            identifier: None,
            address: Some("127.0.0.1".to_string()),
            port: 0,
            unique_service_id: None,
            register: false,
            timing: TimingConfig::default(),
            network: NetworkConfig::default(),
        }
    }
}

impl fmt::Debug for ProcessorServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorServerOptions")
            .field(
                "processor",
                &self.processor.as_ref().map(|p| p.registration_name()),
            )
            .field("identifier", &self.identifier)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("unique_service_id", &self.unique_service_id)
            .field("register", &self.register)
            .field("timing", &self.timing)
            .field("network", &self.network)
            .finish()
    }
}
