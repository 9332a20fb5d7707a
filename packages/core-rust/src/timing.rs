//! Timing samples and the sink contract they are submitted through.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Aggregation key of a timing sample: the active context label and the
/// label of the stopwatch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimingKey {
    pub context: String,
    pub stopwatch: String,
}

impl TimingKey {
    #[must_use]
    pub fn new(context: impl Into<String>, stopwatch: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            stopwatch: stopwatch.into(),
        }
    }
}

impl fmt::Display for TimingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.context, self.stopwatch)
    }
}

/// One completed stopwatch interval observed while a context was active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingSample {
    pub key: TimingKey,
    /// Length of the interval that just ended (not the stopwatch's total).
    pub duration: Duration,
    /// Wall-clock time the interval ended.
    pub observed_at: SystemTime,
}

/// Destination for timing samples.
///
/// `submit` must not block and must not fail: sinks that cannot accept a
/// sample drop it and log.
pub trait TimingSink: Send + Sync {
    fn submit(&self, sample: TimingSample);
}

/// Sink that discards every sample.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl TimingSink for DiscardSink {
    fn submit(&self, _sample: TimingSample) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_key_displays_context_then_stopwatch() {
        let key = TimingKey::new("processor", "foo");
        assert_eq!(key.to_string(), "processor:foo");
    }

    #[test]
    fn timing_keys_order_by_context_first() {
        let a = TimingKey::new("a", "z");
        let b = TimingKey::new("b", "a");
        assert!(a < b);
    }
}
