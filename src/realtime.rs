//! In-process realtime pub/sub hub.
//!
//! One `tokio::sync::broadcast` channel per topic, created lazily on first
//! publish or subscribe. Delivery is at-most-once and best-effort: a slow
//! receiver can be lagged out and a message published with no subscribers is
//! dropped. Subscribers heal through the durable terminal_displays row, so
//! nothing here needs to be reliable.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::DisplayEvent;

const CHANNEL_CAPACITY: usize = 64;

/// Topic for a terminal's display events.
pub fn display_topic(tenant_id: Uuid, terminal_id: Uuid) -> String {
    format!("display:{tenant_id}:{terminal_id}")
}

#[derive(Clone, Debug)]
pub struct RealtimeHub {
    topics: Arc<DashMap<String, broadcast::Sender<DisplayEvent>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<DisplayEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish an event to every current subscriber of `topic`. Returns the
    /// number of subscribers the event reached; zero is not an error.
    pub fn publish(&self, topic: &str, event: DisplayEvent) -> usize {
        match self.sender(topic).send(event) {
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    /// Open a push subscription. The receiver observes every event published
    /// after this call, subject to channel lag.
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<DisplayEvent> {
        self.sender(topic).subscribe()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
