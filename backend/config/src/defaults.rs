//! Config defaults: fills every optional knob of a freshly loaded config.

use crate::schema::TrellisConfig;

/// Default bound on follow-up intent nesting.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 16;

/// Default capacity of the intent event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Default bound on surface nesting.
pub const DEFAULT_MAX_SURFACE_DEPTH: usize = 32;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default settings file name, relative to the config directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: TrellisConfig) -> TrellisConfig {
    let config = apply_intent_defaults(config);
    let config = apply_surface_defaults(config);
    apply_logging_defaults(config)
}

fn apply_intent_defaults(mut config: TrellisConfig) -> TrellisConfig {
    config.intents.max_chain_depth.get_or_insert(DEFAULT_MAX_CHAIN_DEPTH);
    config.intents.event_capacity.get_or_insert(DEFAULT_EVENT_CAPACITY);
    config
}

fn apply_surface_defaults(mut config: TrellisConfig) -> TrellisConfig {
    config.surface.max_depth.get_or_insert(DEFAULT_MAX_SURFACE_DEPTH);
    config
}

fn apply_logging_defaults(mut config: TrellisConfig) -> TrellisConfig {
    if config.logging.level.as_deref().map_or(true, |level| level.trim().is_empty()) {
        config.logging.level = Some(DEFAULT_LOG_LEVEL.to_string());
    }
    config
}
