//! Configuration errors raised while assembling the processing graph.

/// Fatal misconfiguration, surfaced when the graph or server is built and
/// before any network binding is attempted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("processor must be specified")]
    MissingProcessor,
    #[error("server address must be specified")]
    MissingAddress,
    #[error("invalid server address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("timing queue capacity must be at least 1")]
    InvalidTimingQueue,
    #[error("server builder has no processor service attached")]
    MissingService,
    #[error("processing graph must be built inside a tokio runtime")]
    RuntimeUnavailable,
}
