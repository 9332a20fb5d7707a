//! Runs a word-count processor on a `docproc` server.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use docproc_core::{Event, JsonObject, Processor, ProcessingScope};
use docproc_server::cli::ServerArgs;
use docproc_server::telemetry::{init_metrics, init_tracing};
use docproc_server::{InMemoryEventsClient, LocalLifecycle, ProcessingBuilder};
use serde_json::json;
use tracing::{info, warn};

/// Counts whitespace-separated words of the `text` parameter.
struct WordCount;

#[async_trait]
impl Processor for WordCount {
    fn registration_name(&self) -> &str {
        "word-count"
    }

    async fn process(
        &self,
        _event: &Event,
        params: &JsonObject,
        scope: &ProcessingScope,
    ) -> anyhow::Result<JsonObject> {
        let text = params
            .get("text")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("`text` parameter is required"))?;

        let mut stopwatch = scope.started_stopwatch("count");
        let words = text.split_whitespace().count();
        stopwatch.stop()?;

        let mut result = JsonObject::new();
        result.insert("words".to_string(), json!(words));
        Ok(result)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    init_tracing(args.log_json)?;
    if let Some(address) = args.metrics_addr {
        init_metrics(address)?;
        info!(%address, "prometheus exporter listening");
    }

    let options = args.into_options(WordCount);
    let mut server = ProcessingBuilder::new(
        options,
        Arc::new(InMemoryEventsClient::new()),
        Arc::new(LocalLifecycle::new()),
    )
    .build_server()?;

    let bound = server.start().await?;
    info!(address = %bound, "docproc server starting");

    server
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}
