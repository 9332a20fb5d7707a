//! `docproc` server: hosts a document processor over HTTP.
//!
//! The [`processing`] composition root wires the processor, its context
//! manager, the runner, and the processor service into a network server.
//! Timings recorded by processors are aggregated off the request path by
//! the [`timing`] collector.

pub mod cli;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod network;
pub mod processing;
pub mod service;
pub mod telemetry;
pub mod timing;

#[cfg(test)]
mod test_support;

pub use error::ConfigError;
pub use events::InMemoryEventsClient;
pub use lifecycle::LocalLifecycle;
pub use processing::{ProcessingBuilder, ProcessingGraph, ProcessorServer, ProcessorServerOptions};
