//! Timing collection: aggregates stopwatch samples from concurrent
//! requests on one dedicated background worker.
//!
//! - [`collector`]: queue, worker lifecycle, and the non-blocking submission handle
//! - [`aggregate`]: per-key statistics maintained by the worker

pub mod aggregate;
pub mod collector;

pub use aggregate::{TimingAggregator, TimingStats, TimingSummary};
pub use collector::{TimingCollector, TimingConfig, TimingHandle, TimingTask};
