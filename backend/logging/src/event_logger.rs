//! Intent Event Logger
//!
//! Forwards dispatcher events into `tracing` under the `intent_events`
//! target, so they land in the NDJSON log next to everything else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use trellis_intents::IntentEvent;

#[derive(Debug, Serialize)]
pub struct IntentLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: IntentEvent,
}

pub struct IntentEventLogger;

impl IntentEventLogger {
    pub fn entry(event: IntentEvent) -> IntentLogEntry {
        IntentLogEntry { timestamp: Utc::now(), event }
    }

    pub fn log_event(event: IntentEvent) {
        let entry = Self::entry(event);
        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "intent_events", entry = %json, "Intent event"),
            Err(e) => warn!(target: "intent_events", error = %e, "Unserializable intent event"),
        }
    }
}

/// Log every event from `rx` until the bus closes.
pub fn spawn_intent_event_logger(mut rx: broadcast::Receiver<IntentEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => IntentEventLogger::log_event(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(target: "intent_events", skipped, "Intent event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
