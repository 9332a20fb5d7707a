//! docproc core — processor contract, processing contexts, stopwatches, and timing samples.

pub mod clock;
pub mod context;
pub mod error;
pub mod stopwatch;
pub mod timing;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::{
    ContextGuard, ContextManager, ExitError, ProcessingContext, ProcessingScope, ProcessorBinding,
};
pub use error::UsageError;
pub use stopwatch::{Stopwatch, StopwatchState};
pub use timing::{DiscardSink, TimingKey, TimingSample, TimingSink};
pub use traits::{EventsClient, Processor, ServiceLifecycle};
pub use types::{Event, HealthStatus, JsonObject, ProcessorIdentity, ServiceRegistration};
