//! Plugin lifecycle: initialize, ready, unload.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trellis_core::TrellisError;

use crate::definition::{Plugin, PluginDefinition};
use crate::provides::Provides;

/// Current state of a plugin within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Loading,
    Active,
    Failed,
    Unloading,
    Unloaded,
}

/// Run `initialize` and merge its capabilities over the static ones.
pub async fn run_load_sequence(definition: &dyn PluginDefinition) -> Result<Provides, TrellisError> {
    let meta = definition.meta();
    debug!(plugin = %meta.id, "Running load sequence");
    let provides = definition.provides();
    match definition.initialize().await {
        Ok(extra) => {
            info!(plugin = %meta.id, "Plugin initialized");
            Ok(provides.merge(extra))
        }
        Err(source) => {
            warn!(plugin = %meta.id, error = %source, "initialize failed");
            Err(TrellisError::PluginInit { plugin: meta.id, source })
        }
    }
}

/// Run the `ready` hook once all plugins are present.
pub async fn run_ready(plugin: &Plugin, plugins: &[Arc<Plugin>]) -> Result<(), TrellisError> {
    debug!(plugin = %plugin.id(), "Running ready hook");
    plugin
        .definition
        .ready(plugins)
        .await
        .map_err(|source| TrellisError::PluginInit { plugin: plugin.id().to_string(), source })
}

/// Run `unload`. The error is returned for the caller to collect.
pub async fn run_unload_sequence(plugin: &Plugin) -> Result<(), TrellisError> {
    debug!(plugin = %plugin.id(), "Running unload sequence");
    match plugin.definition.unload().await {
        Ok(()) => {
            info!(plugin = %plugin.id(), "Plugin unloaded");
            Ok(())
        }
        Err(source) => {
            warn!(plugin = %plugin.id(), error = %source, "unload failed");
            Err(TrellisError::Teardown { plugin: plugin.id().to_string(), source })
        }
    }
}
