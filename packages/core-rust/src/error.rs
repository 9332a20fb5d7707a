//! Usage errors raised by stopwatches and processing contexts.
//!
//! These indicate programmer bugs (unbalanced start/stop, out-of-order
//! context release) and are surfaced to the caller immediately.

/// Misuse of a [`Stopwatch`](crate::Stopwatch) or [`ProcessingScope`](crate::ProcessingScope).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UsageError {
    #[error("stopwatch `{label}` is already running")]
    AlreadyRunning { label: String },
    #[error("stopwatch `{label}` is not running")]
    NotRunning { label: String },
    #[error("context `{label}` exited while `{active}` is the active context")]
    OutOfOrderExit { label: String, active: String },
}
