use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// JSON object used for processing parameters and result fields.
pub type JsonObject = serde_json::Map<String, serde_json::Value>;

/// Handle to an event leased from the events service.
///
/// Documents and labels are owned by the events service; the processing core
/// only carries the identifier and event-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier of the event.
    pub event_id: String,
    /// Event-level string metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Event {
    #[must_use]
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Resolved name and identifier of the hosted processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorIdentity {
    /// Declared registration name of the processor.
    pub name: String,
    /// Identifier the processor is served under; defaults to `name`.
    pub id: String,
}

/// Health of a named service as reported to health checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Serving,
    NotServing,
}

impl HealthStatus {
    /// Returns the lowercase string representation used in health responses.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Serving => "serving",
            Self::NotServing => "not_serving",
        }
    }
}

/// Registration record handed to the service lifecycle when a processor
/// announces itself for discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// Service name (the processor identifier).
    pub service_name: String,
    /// Identifier unique to this running instance.
    pub unique_service_id: String,
    /// Address the instance is reachable at, `host:port`.
    pub address: String,
    /// Discovery tags.
    pub tags: Vec<String>,
}
