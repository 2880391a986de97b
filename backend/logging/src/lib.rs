//! Structured logging for Trellis.
//!
//! Console output, optional rolling NDJSON files, environment-based level
//! control, and a forwarder that turns intent events into log records.

pub mod event_logger;
pub mod logger;

pub use event_logger::{spawn_intent_event_logger, IntentEventLogger, IntentLogEntry};
pub use logger::init_logger;
