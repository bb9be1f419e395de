//! # Event Publisher
//!
//! Broadcast channel for campaign lifecycle events. Publishing never blocks
//! orchestration: events with no subscribers are dropped silently, since the
//! engine's correctness never depends on anyone listening.

use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CampaignLifecycleEvent>,
}

/// An event as delivered to subscribers
#[derive(Debug, Clone)]
pub struct CampaignLifecycleEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and JSON context. Infallible:
    /// a send error only means there are no subscribers right now.
    pub async fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = CampaignLifecycleEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CampaignLifecycleEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
