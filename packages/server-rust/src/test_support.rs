//! Processors shared by unit tests across the crate.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docproc_core::{Event, JsonObject, Processor, ProcessingScope, ProcessorBinding};
use parking_lot::Mutex;
use serde_json::json;

/// Naps for a millisecond under a `nap` stopwatch and counts its calls.
#[derive(Debug, Default)]
pub struct SleepyProcessor {
    pub calls: Arc<AtomicU32>,
    pub binding: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Processor for SleepyProcessor {
    fn registration_name(&self) -> &str {
        "sleepy"
    }

    fn bind(&mut self, binding: ProcessorBinding) {
        *self.binding.lock() = Some(binding.processor_id().to_string());
    }

    async fn process(
        &self,
        _event: &Event,
        _params: &JsonObject,
        scope: &ProcessingScope,
    ) -> anyhow::Result<JsonObject> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut stopwatch = scope.started_stopwatch("nap");
        tokio::time::sleep(Duration::from_millis(1)).await;
        stopwatch.stop()?;

        let mut result = JsonObject::new();
        result.insert("slept".to_string(), json!(true));
        Ok(result)
    }
}

/// Always fails.
#[derive(Debug, Default)]
pub struct FailingProcessor;

#[async_trait]
impl Processor for FailingProcessor {
    fn registration_name(&self) -> &str {
        "failing"
    }

    async fn process(
        &self,
        _event: &Event,
        _params: &JsonObject,
        _scope: &ProcessingScope,
    ) -> anyhow::Result<JsonObject> {
        Err(anyhow::anyhow!("processor exploded"))
    }
}

/// Naps far longer than any test waits for it.
#[derive(Debug, Default)]
pub struct StalledProcessor;

#[async_trait]
impl Processor for StalledProcessor {
    fn registration_name(&self) -> &str {
        "stalled"
    }

    async fn process(
        &self,
        _event: &Event,
        _params: &JsonObject,
        _scope: &ProcessingScope,
    ) -> anyhow::Result<JsonObject> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(JsonObject::new())
    }
}
