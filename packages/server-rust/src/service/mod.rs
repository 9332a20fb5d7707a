//! Processing services hosted by the server.
//!
//! 1. **Runner** (`runner`): runs the processor inside a context scope per request
//! 2. **Processor service** (`processor`): runner + timing collector + lifecycle
//! 3. **Health** (`health`): server-wide health status
//! 4. **Registry** (`registry`): init/shutdown ordering of hosted services
//! 5. **Background workers** (`worker`): the queue-draining worker behind timing collection

pub mod health;
pub mod processor;
pub mod registry;
pub mod runner;
pub mod worker;

pub use health::HealthService;
pub use processor::{ProcessorInfo, ProcessorService};
pub use registry::{ManagedService, ServiceContext, ServiceRegistry};
pub use runner::{ProcessRequest, ProcessResponse, ProcessingError, ProcessorRunner, Runner};
pub use worker::{BackgroundRunnable, BackgroundWorker, TrySubmitError, WorkerSender};
