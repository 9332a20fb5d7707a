use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use docproc_core::{TimingKey, TimingSample};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use super::collector::TimingTask;
use crate::service::worker::BackgroundRunnable;

/// Running statistics for one timing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingStats {
    pub count: u64,
    pub total: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TimingStats {
    pub fn record(&mut self, duration: Duration) {
        if self.count == 0 || duration < self.min {
            self.min = duration;
        }
        if duration > self.max {
            self.max = duration;
        }
        self.count += 1;
        self.total += duration;
    }

    /// Mean interval length; zero when nothing was recorded.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Duration {
        match u32::try_from(self.count) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total / n,
            Err(_) => Duration::from_secs_f64(self.total.as_secs_f64() / self.count as f64),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn millis(duration: Duration) -> f64 {
    duration.as_nanos() as f64 / 1_000_000.0
}

impl Serialize for TimingStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TimingStats", 5)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("total_ms", &millis(self.total))?;
        state.serialize_field("mean_ms", &millis(self.mean()))?;
        state.serialize_field("min_ms", &millis(self.min))?;
        state.serialize_field("max_ms", &millis(self.max))?;
        state.end()
    }
}

/// Point-in-time copy of every key's statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimingSummary {
    stats: BTreeMap<TimingKey, TimingStats>,
}

impl TimingSummary {
    #[must_use]
    pub fn get(&self, key: &TimingKey) -> Option<&TimingStats> {
        self.stats.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stats.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TimingKey, &TimingStats)> {
        self.stats.iter()
    }
}

/// Serialized as a map keyed by `"context:stopwatch"`.
impl Serialize for TimingSummary {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.stats.len()))?;
        for (key, stats) in &self.stats {
            map.serialize_entry(&key.to_string(), stats)?;
        }
        map.end()
    }
}

/// Worker-side state of the timing collector. Only the collector's worker
/// task touches it.
#[derive(Debug, Default)]
pub struct TimingAggregator {
    stats: BTreeMap<TimingKey, TimingStats>,
}

impl TimingAggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sample: &TimingSample) {
        self.stats
            .entry(sample.key.clone())
            .or_default()
            .record(sample.duration);
    }

    #[must_use]
    pub fn summary(&self) -> TimingSummary {
        TimingSummary {
            stats: self.stats.clone(),
        }
    }
}

#[async_trait]
impl BackgroundRunnable for TimingAggregator {
    type Task = TimingTask;

    async fn run(&mut self, task: TimingTask) {
        match task {
            TimingTask::Record(sample) => self.record(&sample),
            TimingTask::Summary(reply) => {
                // The requester may have given up; nothing to do then.
                let _ = reply.send(self.summary());
            }
        }
    }

    async fn on_tick(&mut self) {
        for (key, stats) in &self.stats {
            debug!(
                key = %key,
                count = stats.count,
                mean_ms = millis(stats.mean()),
                max_ms = millis(stats.max),
                "timing summary"
            );
        }
    }

    async fn shutdown(&mut self) {
        let samples: u64 = self.stats.values().map(|s| s.count).sum();
        info!(keys = self.stats.len(), samples, "timing collector stopped");
    }
}
