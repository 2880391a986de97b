pub mod definition;
pub mod lifecycle;
pub mod provides;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use definition::{Plugin, PluginDefinition};
pub use lifecycle::{run_load_sequence, run_ready, run_unload_sequence, PluginState};
pub use provides::{
    filter_plugins, parse_graph_plugin, parse_intent_plugin, parse_surface_plugin,
    parse_translations_plugin, resolve_plugin, FnResolver, GraphAction, GraphBuilder,
    IntentResolver, Provides, Resource, SurfaceProvider,
};
pub use registry::{DispatchGuard, PluginRegistry};
