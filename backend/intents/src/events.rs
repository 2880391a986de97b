//! Intent event bus
//!
//! Publish-subscribe channel letting observers (devtools, audit plugins) watch
//! intents flow through the dispatcher without taking part in routing.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

pub const DEFAULT_EVENT_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntentEvent {
    Dispatched { action: String, target: Option<String> },
    Resolved { action: String, plugin: String },
    Unresolved { action: String },
    Failed { action: String, plugin: String, error: String },
}

#[derive(Clone)]
pub struct IntentEventBus {
    sender: broadcast::Sender<IntentEvent>,
}

impl IntentEventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { sender: tx }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub fn publish(&self, event: IntentEvent) {
        debug!("Publishing IntentEvent: {:?}", event);
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.sender.subscribe()
    }
}

impl Default for IntentEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = IntentEventBus::default();
        let mut rx = bus.subscribe();
        bus.publish(IntentEvent::Unresolved { action: "OPEN".into() });
        assert_eq!(rx.recv().await.unwrap(), IntentEvent::Unresolved { action: "OPEN".into() });
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        IntentEventBus::new(0).publish(IntentEvent::Unresolved { action: "OPEN".into() });
    }
}
