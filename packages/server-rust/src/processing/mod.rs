//! Composition root: assembles a processor server from options, external
//! clients, and optional per-slot overrides.
//!
//! [`ProcessingBuilder::build`] resolves every slot exactly once, in
//! dependency order, into an immutable [`ProcessingGraph`]. The graph then
//! yields a [`ProcessorServer`].

pub mod builder;
pub mod options;

pub use builder::{ProcessingBuilder, ProcessingGraph, ProcessorServer};
pub use options::ProcessorServerOptions;
