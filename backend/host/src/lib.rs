pub mod catalog;
pub mod fallback;
pub mod host;
pub mod settings;
pub mod state;

pub use catalog::{CatalogEntry, PluginCatalog, PluginFactory};
pub use fallback::{default_fallback, error_display, render_error};
pub use host::{Host, PluginStatus, RunningApp, ROOT_SURFACE};
pub use settings::{EnablementStore, FileEnablementStore, MemoryEnablementStore, PluginSettings};
pub use state::{HostState, SharedHostState};
