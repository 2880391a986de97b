pub mod dispatcher;
pub mod events;

pub use dispatcher::{IntentDispatcher, DEFAULT_MAX_CHAIN_DEPTH};
pub use events::{IntentEvent, IntentEventBus, DEFAULT_EVENT_CAPACITY};
