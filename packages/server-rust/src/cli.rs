//! Command-line arguments of the server binary.

use std::net::SocketAddr;

use clap::builder::RangedU64ValueParser;
use clap::Parser;
use docproc_core::Processor;

use crate::processing::ProcessorServerOptions;
use crate::timing::TimingConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "docproc-server", version, about = "Hosts a document processor over HTTP")]
pub struct ServerArgs {
    /// Host to bind.
    #[arg(long, env = "DOCPROC_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind; 0 lets the OS pick.
    #[arg(short, long, env = "DOCPROC_PORT", default_value_t = 9090)]
    pub port: u16,

    /// Processor id; defaults to the processor's registration name.
    #[arg(long, env = "DOCPROC_IDENTIFIER")]
    pub identifier: Option<String>,

    /// Id used when registering with the service lifecycle.
    #[arg(long, env = "DOCPROC_UNIQUE_SERVICE_ID")]
    pub unique_service_id: Option<String>,

    /// Register the processor with the service lifecycle on start.
    #[arg(long, env = "DOCPROC_REGISTER")]
    pub register: bool,

    /// Capacity of the timing collector's queue.
    #[arg(
        long,
        env = "DOCPROC_TIMING_QUEUE_CAPACITY",
        default_value_t = 1024,
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub timing_queue_capacity: usize,

    /// Emit logs as JSON lines.
    #[arg(long, env = "DOCPROC_LOG_JSON")]
    pub log_json: bool,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "DOCPROC_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

impl ServerArgs {
    #[must_use]
    pub fn into_options(self, processor: impl Processor + 'static) -> ProcessorServerOptions {
        ProcessorServerOptions {
            processor: Some(Box::new(processor)),
            identifier: self.identifier,
            address: Some(self.host),
            port: self.port,
            unique_service_id: self.unique_service_id,
            register: self.register,
            timing: TimingConfig {
                queue_capacity: self.timing_queue_capacity,
                ..TimingConfig::default()
            },
            ..ProcessorServerOptions::default()
        }
    }
}
