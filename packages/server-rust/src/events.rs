//! In-memory events client for tests and local runs.
//!
//! Events are created on first open and removed once every lease taken on
//! them has been released.

use async_trait::async_trait;
use dashmap::DashMap;
use docproc_core::{Event, EventsClient};

#[derive(Debug)]
struct Leased {
    event: Event,
    leases: usize,
}

#[derive(Debug, Default)]
pub struct InMemoryEventsClient {
    events: DashMap<String, Leased>,
}

impl InMemoryEventsClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `event` so the next `open_event` for its id returns it.
    pub fn insert(&self, event: Event) {
        self.events
            .insert(event.event_id.clone(), Leased { event, leases: 0 });
    }

    /// Outstanding leases on `event_id`; zero if the event is not held.
    #[must_use]
    pub fn lease_count(&self, event_id: &str) -> usize {
        self.events.get(event_id).map_or(0, |entry| entry.leases)
    }
}

#[async_trait]
impl EventsClient for InMemoryEventsClient {
    async fn open_event(&self, event_id: &str) -> anyhow::Result<Event> {
        let mut entry = self
            .events
            .entry(event_id.to_string())
            .or_insert_with(|| Leased {
                event: Event::new(event_id),
                leases: 0,
            });
        entry.leases += 1;
        Ok(entry.event.clone())
    }

    async fn close_event(&self, event_id: &str) -> anyhow::Result<()> {
        let mut entry = self
            .events
            .get_mut(event_id)
            .filter(|leased| leased.leases > 0)
            .ok_or_else(|| anyhow::anyhow!("event {event_id} is not open"))?;
        entry.leases -= 1;
        let released = entry.leases == 0;
        drop(entry);
        if released {
            self.events.remove_if(event_id, |_, leased| leased.leases == 0);
        }
        Ok(())
    }
}
