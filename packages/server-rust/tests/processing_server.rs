//! End-to-end: build a processor server, serve it on an ephemeral port, and
//! drive it over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docproc_core::{Event, HealthStatus, JsonObject, Processor, ProcessingScope, ServiceLifecycle};
use docproc_server::{
    InMemoryEventsClient, LocalLifecycle, ProcessingBuilder, ProcessorServerOptions,
};
use serde_json::{json, Value};

struct Echo;

#[async_trait]
impl Processor for Echo {
    fn registration_name(&self) -> &str {
        "echo"
    }

    async fn process(
        &self,
        event: &Event,
        params: &JsonObject,
        scope: &ProcessingScope,
    ) -> anyhow::Result<JsonObject> {
        if params.contains_key("fail") {
            anyhow::bail!("asked to fail");
        }
        let _inner = scope.enter("echo-inner");
        let mut stopwatch = scope.started_stopwatch("copy");
        tokio::time::sleep(Duration::from_millis(1)).await;
        let mut result = params.clone();
        result.insert("event".to_string(), json!(event.event_id));
        stopwatch.stop()?;
        Ok(result)
    }
}

async fn wait_ready(client: &reqwest::Client, base: &str) {
    for _ in 0..200 {
        if let Ok(response) = client.get(format!("{base}/health/ready")).send().await {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("server never became ready");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_process_info_stats_and_health() {
    let lifecycle = Arc::new(LocalLifecycle::new());
    let mut options = ProcessorServerOptions::for_processor(Echo);
    options.identifier = Some("echo-1".to_string());
    options.register = true;

    let mut server = ProcessingBuilder::new(
        options,
        Arc::new(InMemoryEventsClient::new()),
        lifecycle.clone(),
    )
    .build_server()
    .unwrap();
    let bound = server.start().await.unwrap();
    let base = format!("http://{bound}");

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let serving = tokio::spawn(server.serve(async {
        let _ = stop_rx.await;
    }));

    let client = reqwest::Client::new();
    wait_ready(&client, &base).await;
    assert_eq!(lifecycle.registrations().len(), 1);

    let response = client
        .post(format!("{base}/v1/processors/echo-1/process"))
        .json(&json!({ "event_id": "doc-1", "params": { "text": "hello" } }))
        .send()
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["event_id"], "doc-1");
    assert_eq!(body["result"]["text"], "hello");
    assert_eq!(body["result"]["event"], "doc-1");
    assert!(body["timing_info_ms"]["echo-inner:copy"].as_f64().unwrap() >= 1.0);
    assert!(body["timing_info_ms"]["echo-1:process_method"].is_number());

    let failed = client
        .post(format!("{base}/v1/processors/echo-1/process"))
        .json(&json!({ "event_id": "doc-2", "params": { "fail": true } }))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), 500);

    let unknown = client
        .post(format!("{base}/v1/processors/other/process"))
        .json(&json!({ "event_id": "doc-3" }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), 404);

    let info: Value = client
        .get(format!("{base}/v1/processors/echo-1/info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["name"], "echo");
    assert_eq!(info["id"], "echo-1");

    let stats: Value = client
        .get(format!("{base}/v1/processors/echo-1/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["echo-inner:copy"]["count"], 1);
    assert_eq!(stats["echo-1:process_method"]["count"], 2);

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["state"], "ready");
    assert_eq!(health["server"], "serving");
    assert_eq!(health["processor"]["status"], "serving");

    stop_tx.send(()).unwrap();
    serving.await.unwrap().unwrap();

    assert_eq!(lifecycle.health("echo-1"), HealthStatus::NotServing);
    assert!(lifecycle.registrations().is_empty());
}
