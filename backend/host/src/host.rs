//! Application bootstrap.
//!
//! [`Host::bootstrap`] decides which plugins to load (core plus the enabled
//! optional set), constructs them concurrently, registers them in catalog
//! order and waits for every `ready` hook. The result is a [`RunningApp`]
//! exposing intent dispatch, the root surface and teardown.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use trellis_config::TrellisConfig;
use trellis_core::{Intent, IntentResult, PluginMeta, Result, SurfaceRequest, TrellisError};
use trellis_intents::{IntentDispatcher, IntentEvent, IntentEventBus};
use trellis_plugins::{
    filter_plugins, parse_graph_plugin, parse_translations_plugin, GraphAction, PluginRegistry,
    PluginState, Resource,
};
use trellis_surface::{RenderedNode, SurfaceResolver};

use crate::catalog::PluginCatalog;
use crate::fallback::default_fallback;
use crate::settings::{EnablementStore, FileEnablementStore, MemoryEnablementStore, PluginSettings};
use crate::state::{HostState, SharedHostState};

/// Name of the surface the host mounts at the top of the tree.
pub const ROOT_SURFACE: &str = "root";

/// One row of [`RunningApp::plugins`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginStatus {
    pub meta: PluginMeta,
    pub core: bool,
    pub enabled: bool,
    /// `None` when the plugin is in the catalog but was not loaded.
    pub state: Option<PluginState>,
}

pub struct Host {
    config: TrellisConfig,
    catalog: PluginCatalog,
    settings: Arc<dyn EnablementStore>,
    state: SharedHostState,
}

impl Host {
    /// A host over `catalog`. Enablement is persisted to the configured
    /// settings file, or kept in memory when none is configured.
    pub fn new(config: TrellisConfig, catalog: PluginCatalog) -> Self {
        let settings: Arc<dyn EnablementStore> = match &config.host.settings_path {
            Some(path) => Arc::new(FileEnablementStore::new(path)),
            None => Arc::new(MemoryEnablementStore::new()),
        };
        Self { config, catalog, settings, state: SharedHostState::default() }
    }

    pub fn with_settings(mut self, settings: Arc<dyn EnablementStore>) -> Self {
        self.settings = settings;
        self
    }

    /// The lifecycle shared with the [`RunningApp`] this host booted.
    pub fn state(&self) -> HostState {
        self.state.get()
    }

    /// Optional plugins to load: the persisted set, or the configured
    /// defaults when nothing has been saved yet.
    async fn enabled_optional(&self) -> Vec<String> {
        match self.settings.load().await {
            Ok(Some(settings)) => settings.enabled,
            Ok(None) => self.config.host.defaults.clone(),
            Err(e) => {
                warn!("[Host] Could not load plugin settings, using defaults: {:#}", e);
                self.config.host.defaults.clone()
            }
        }
    }

    /// Load every enabled plugin and wait for them to be ready.
    ///
    /// Any failure (unknown core plugin, failing factory, failing
    /// `initialize` or `ready`) fails the whole boot; plugins that did
    /// initialize are unloaded again before the error is returned.
    pub async fn bootstrap(&mut self) -> Result<RunningApp> {
        self.state.transition(HostState::Initializing)?;
        info!("[Host] Bootstrapping {} catalog plugin(s)", self.catalog.len());

        let registry = PluginRegistry::new();
        let core = self.config.host.core.clone();
        let optional = self.enabled_optional().await;

        for id in &core {
            if !self.catalog.contains(id) {
                registry.defer(TrellisError::UnknownPlugin(id.clone()));
            }
        }
        for id in &optional {
            if !self.catalog.contains(id) {
                warn!("[Host] Ignoring unknown enabled plugin: {}", id);
            }
        }

        let selected: Vec<_> = self
            .catalog
            .entries()
            .filter(|entry| core.contains(&entry.meta.id) || optional.contains(&entry.meta.id))
            .collect();
        debug!(plugins = ?selected.iter().map(|e| &e.meta.id).collect::<Vec<_>>(), "Selected plugins");

        // Construct concurrently; register in catalog order.
        let definitions = join_all(selected.iter().map(|entry| entry.instantiate())).await;
        for (entry, definition) in selected.iter().zip(definitions) {
            let outcome = match definition {
                Ok(definition) => registry.register(definition).await.map(|_| ()),
                Err(source) => Err(TrellisError::PluginInit { plugin: entry.meta.id.clone(), source }),
            };
            if let Err(e) = outcome {
                registry.defer(e);
            }
        }

        if let Err(e) = registry.ready().await {
            self.state.transition(HostState::Failed)?;
            warn!("[Host] Boot failed: {}", e);
            match registry.unload_all().await {
                Ok(errors) => {
                    for teardown in errors {
                        warn!("[Host] Teardown after failed boot: {}", teardown);
                    }
                }
                Err(unload) => warn!("[Host] Could not unload after failed boot: {}", unload),
            }
            return Err(e);
        }
        self.state.transition(HostState::Ready)?;

        let events = IntentEventBus::new(self.config.event_capacity());
        let dispatcher = IntentDispatcher::new(registry.clone())
            .with_max_chain_depth(self.config.max_chain_depth())
            .with_event_bus(events);
        let surfaces = SurfaceResolver::new(registry.clone()).with_max_depth(self.config.max_surface_depth());

        let app = RunningApp {
            registry,
            dispatcher,
            surfaces,
            catalog: self.catalog.clone(),
            settings: self.settings.clone(),
            core,
            optional,
            state: self.state.clone(),
        };
        app.state.transition(HostState::Running)?;
        info!("[Host] Running with {} plugin(s)", app.registry.plugins().len());
        Ok(app)
    }
}

/// A booted application.
pub struct RunningApp {
    registry: PluginRegistry,
    dispatcher: IntentDispatcher,
    surfaces: SurfaceResolver,
    catalog: PluginCatalog,
    settings: Arc<dyn EnablementStore>,
    core: Vec<String>,
    optional: Vec<String>,
    state: SharedHostState,
}

impl RunningApp {
    pub fn state(&self) -> HostState {
        self.state.get()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn surfaces(&self) -> &SurfaceResolver {
        &self.surfaces
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.dispatcher.subscribe()
    }

    fn ensure_running(&self) -> Result<()> {
        match self.state.get() {
            HostState::Running => Ok(()),
            other => Err(TrellisError::InvalidState { from: other.to_string(), to: HostState::Running.to_string() }),
        }
    }

    pub async fn dispatch(&self, intents: impl Into<Vec<Intent>>) -> Result<Option<IntentResult>> {
        self.ensure_running()?;
        self.dispatcher.dispatch(intents).await
    }

    /// The root request, with the host's error display as its boundary.
    pub fn root_request(&self) -> SurfaceRequest {
        SurfaceRequest::role(ROOT_SURFACE).with_fallback(default_fallback())
    }

    pub fn render_root(&self) -> Result<Vec<RenderedNode>> {
        self.render(&self.root_request())
    }

    pub fn render(&self, request: &SurfaceRequest) -> Result<Vec<RenderedNode>> {
        self.ensure_running()?;
        self.surfaces.render(request)
    }

    /// Actions contributed by enabled plugins, in plugin order.
    pub fn actions(&self) -> Vec<GraphAction> {
        let plugins = self.registry.get_enabled();
        filter_plugins(&plugins, parse_graph_plugin)
            .into_iter()
            .flat_map(|(_, builder)| builder.actions(&plugins))
            .collect()
    }

    /// Dispatch an action's intents as one chained array.
    pub async fn invoke_action(&self, id: &str) -> Result<Option<IntentResult>> {
        let action = self
            .actions()
            .into_iter()
            .find(|action| action.id == id)
            .ok_or_else(|| TrellisError::UnknownAction(id.to_string()))?;
        debug!(action = %action.id, count = action.intents.len(), "Invoking action");
        self.dispatch(action.intents).await
    }

    /// Translation resources of enabled plugins, concatenated in plugin order.
    pub fn translations(&self) -> Vec<Resource> {
        let plugins = self.registry.get_enabled();
        filter_plugins(&plugins, parse_translations_plugin)
            .into_iter()
            .flat_map(|(_, resources)| resources.iter().cloned())
            .collect()
    }

    /// Every catalog plugin with its enablement and load state.
    pub fn plugins(&self) -> Vec<PluginStatus> {
        let loaded = self.registry.list();
        self.catalog
            .metas()
            .map(|meta| {
                let core = self.core.contains(&meta.id);
                let row = loaded.iter().find(|(m, _, _)| m.id == meta.id);
                PluginStatus {
                    meta: meta.clone(),
                    core,
                    enabled: core || self.optional.contains(&meta.id),
                    state: row.map(|(_, state, _)| *state),
                }
            })
            .collect()
    }

    /// Enable or disable an optional plugin and persist the choice.
    ///
    /// A loaded plugin stops (or resumes) contributing immediately. Enabling
    /// a plugin that was not loaded at boot takes effect on the next boot.
    pub async fn set_plugin_enabled(&mut self, id: &str, enabled: bool) -> Result<()> {
        self.ensure_running()?;
        if !self.catalog.contains(id) {
            return Err(TrellisError::UnknownPlugin(id.to_string()));
        }
        if self.core.iter().any(|core| core == id) {
            if enabled {
                return Ok(());
            }
            return Err(TrellisError::Config(format!("core plugin '{id}' cannot be disabled")));
        }

        let mut optional = self.optional.clone();
        optional.retain(|existing| existing != id);
        if enabled {
            optional.push(id.to_string());
        }
        let previous = self.registry.list().into_iter().find(|(meta, _, _)| meta.id == id).map(|(_, _, on)| on);
        let loaded = if enabled { self.registry.enable(id)? } else { self.registry.disable(id)? };

        if let Err(e) = self.settings.save(&PluginSettings { enabled: optional.clone() }).await {
            // Keep the live registry in line with what is persisted.
            match previous {
                Some(true) => self.registry.enable(id)?,
                Some(false) => self.registry.disable(id)?,
                None => false,
            };
            return Err(e.into());
        }
        self.optional = optional;
        info!("[Host] Plugin {} {} (loaded: {})", id, if enabled { "enabled" } else { "disabled" }, loaded);
        Ok(())
    }

    /// Unload every plugin in reverse load order.
    ///
    /// All plugins get their `unload` call even if some fail; the failures
    /// are returned together.
    pub async fn unload(&mut self) -> Result<()> {
        self.state.transition(HostState::Unloading)?;
        let errors = self.registry.unload_all().await?;
        self.state.transition(HostState::Unloaded)?;
        if errors.is_empty() {
            info!("[Host] Unloaded");
            Ok(())
        } else {
            Err(TrellisError::TeardownFailed(errors))
        }
    }
}
