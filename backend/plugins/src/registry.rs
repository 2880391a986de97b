/// Plugin registry: ordered, id-unique store of initialized plugins.
///
/// Registration order is significant. It is the order intents are matched in,
/// the order `ready` hooks run in, and the reverse of teardown order.
///
/// The registry is a cheap cloneable handle. Reads snapshot the plugin list;
/// the lock is never held across an `.await`. Mutations are refused while a
/// dispatch holds a [`DispatchGuard`].
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};
use trellis_core::{PluginMeta, Result, TrellisError};

use crate::definition::{Plugin, PluginDefinition};
use crate::lifecycle::{run_load_sequence, run_ready, run_unload_sequence, PluginState};

struct Entry {
    meta: PluginMeta,
    plugin: Option<Arc<Plugin>>,
    state: PluginState,
    enabled: bool,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<Entry>,
    /// Failures captured during registration, re-raised by `ready`.
    deferred: Vec<TrellisError>,
}

#[derive(Default, Clone)]
pub struct PluginRegistry {
    state: Arc<RwLock<RegistryState>>,
    in_flight: Arc<AtomicUsize>,
}

/// Marks a dispatch as in flight for as long as it lives.
pub struct DispatchGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.in_flight.load(Ordering::SeqCst) {
            0 => Ok(()),
            in_flight => Err(TrellisError::RegistryBusy { in_flight }),
        }
    }

    fn set_state(&self, id: &str, state: PluginState) {
        if let Some(entry) = self.write().entries.iter_mut().find(|e| e.meta.id == id) {
            entry.state = state;
        }
    }

    /// Load a definition and await its `initialize`.
    ///
    /// Returns `Ok(None)` when `initialize` fails: the error is kept and
    /// re-raised by [`PluginRegistry::ready`] so siblings still get to load.
    pub async fn register(&self, definition: Arc<dyn PluginDefinition>) -> Result<Option<Arc<Plugin>>> {
        self.ensure_idle()?;
        let meta = definition.meta();
        {
            let mut state = self.write();
            if state.entries.iter().any(|e| e.meta.id == meta.id) {
                return Err(TrellisError::DuplicatePlugin(meta.id));
            }
            // Reserve the slot first so order follows the register calls.
            state.entries.push(Entry {
                meta: meta.clone(),
                plugin: None,
                state: PluginState::Loading,
                enabled: true,
            });
        }

        match run_load_sequence(definition.as_ref()).await {
            Ok(provides) => {
                let plugin = Arc::new(Plugin::new(meta.clone(), provides, definition));
                let mut state = self.write();
                if let Some(entry) = state.entries.iter_mut().find(|e| e.meta.id == meta.id) {
                    entry.plugin = Some(plugin.clone());
                    entry.state = PluginState::Active;
                }
                info!("[Plugins] Registered: {}", meta.id);
                Ok(Some(plugin))
            }
            Err(e) => {
                warn!("[Plugins] Deferring failure of {}: {}", meta.id, e);
                let mut state = self.write();
                if let Some(entry) = state.entries.iter_mut().find(|e| e.meta.id == meta.id) {
                    entry.state = PluginState::Failed;
                }
                state.deferred.push(e);
                Ok(None)
            }
        }
    }

    /// Record a failure that happened before a definition reached the
    /// registry (e.g. its factory failed). Re-raised by `ready`.
    pub fn defer(&self, error: TrellisError) {
        warn!("[Plugins] Deferring failure: {}", error);
        self.write().deferred.push(error);
    }

    /// Re-raise the first deferred failure, or run every `ready` hook in
    /// registration order.
    pub async fn ready(&self) -> Result<()> {
        let deferred = std::mem::take(&mut self.write().deferred);
        let mut failures = deferred.into_iter();
        if let Some(first) = failures.next() {
            for other in failures {
                warn!("[Plugins] Additional initialization failure: {}", other);
            }
            return Err(first);
        }

        let plugins = self.plugins();
        for plugin in &plugins {
            run_ready(plugin, &plugins).await?;
        }
        info!("[Plugins] {} plugin(s) ready", plugins.len());
        Ok(())
    }

    /// Active plugins in registration order.
    pub fn plugins(&self) -> Vec<Arc<Plugin>> {
        self.read()
            .entries
            .iter()
            .filter(|e| e.state == PluginState::Active)
            .filter_map(|e| e.plugin.clone())
            .collect()
    }

    /// Active plugins that are also enabled, in registration order.
    pub fn get_enabled(&self) -> Vec<Arc<Plugin>> {
        self.read()
            .entries
            .iter()
            .filter(|e| e.state == PluginState::Active && e.enabled)
            .filter_map(|e| e.plugin.clone())
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Plugin>> {
        self.read()
            .entries
            .iter()
            .find(|e| e.meta.id == id)
            .and_then(|e| e.plugin.clone())
    }

    pub fn state(&self, id: &str) -> Option<PluginState> {
        self.read().entries.iter().find(|e| e.meta.id == id).map(|e| e.state)
    }

    /// Metadata of every plugin ever registered, failed ones included.
    pub fn list(&self) -> Vec<(PluginMeta, PluginState, bool)> {
        self.read()
            .entries
            .iter()
            .map(|e| (e.meta.clone(), e.state, e.enabled))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enable(&self, id: &str) -> Result<bool> {
        self.set_enabled(id, true)
    }

    pub fn disable(&self, id: &str) -> Result<bool> {
        self.set_enabled(id, false)
    }

    fn set_enabled(&self, id: &str, enabled: bool) -> Result<bool> {
        self.ensure_idle()?;
        let mut state = self.write();
        match state.entries.iter_mut().find(|e| e.meta.id == id) {
            Some(entry) => {
                entry.enabled = enabled;
                debug!(plugin = %id, enabled, "Plugin enablement changed");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Mark a dispatch as in flight.
    pub fn begin_dispatch(&self) -> DispatchGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        DispatchGuard { in_flight: self.in_flight.clone() }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Unload every active plugin in reverse registration order.
    ///
    /// A failing `unload` is logged and collected; the remaining plugins are
    /// still torn down.
    pub async fn unload_all(&self) -> Result<Vec<TrellisError>> {
        self.ensure_idle()?;
        let plugins = self.plugins();
        let mut errors = Vec::new();
        for plugin in plugins.iter().rev() {
            self.set_state(plugin.id(), PluginState::Unloading);
            if let Err(e) = run_unload_sequence(plugin).await {
                warn!("[Plugins] Teardown error in {}: {}", plugin.id(), e);
                errors.push(e);
            }
            self.set_state(plugin.id(), PluginState::Unloaded);
        }
        Ok(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CallLog, TestPlugin};

    #[tokio::test]
    async fn test_register_preserves_order_and_rejects_duplicates() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        for id in ["a", "b", "c"] {
            registry.register(TestPlugin::new(id, &log).build()).await.unwrap();
        }
        let ids: Vec<_> = registry.plugins().iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let err = registry.register(TestPlugin::new("b", &log).build()).await.unwrap_err();
        assert!(matches!(err, TrellisError::DuplicatePlugin(id) if id == "b"));
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_init_failure_is_deferred_until_ready() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("a", &log).build()).await.unwrap();
        let failed = registry
            .register(TestPlugin::new("b", &log).failing_initialize("no client").build())
            .await
            .unwrap();
        assert!(failed.is_none());
        // Sibling after the failure still initializes.
        registry.register(TestPlugin::new("c", &log).build()).await.unwrap();

        assert_eq!(log.entries(), vec!["a:initialize", "b:initialize", "c:initialize"]);
        assert_eq!(registry.state("b"), Some(PluginState::Failed));
        assert_eq!(registry.plugins().len(), 2);

        let err = registry.ready().await.unwrap_err();
        assert!(matches!(err, TrellisError::PluginInit { ref plugin, .. } if plugin == "b"));
        assert!(log.matching(":ready").is_empty());
    }

    #[tokio::test]
    async fn test_ready_runs_in_registration_order_with_all_plugins() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        for id in ["a", "b"] {
            registry.register(TestPlugin::new(id, &log).build()).await.unwrap();
        }
        registry.ready().await.unwrap();
        assert_eq!(log.matching(":ready"), vec!["a:ready(2)", "b:ready(2)"]);
    }

    #[tokio::test]
    async fn test_ready_failure_is_plugin_init_error() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("a", &log).failing_ready("bad").build()).await.unwrap();
        registry.register(TestPlugin::new("b", &log).build()).await.unwrap();
        let err = registry.ready().await.unwrap_err();
        assert_eq!(err.plugin(), Some("a"));
        assert_eq!(log.matching(":ready"), vec!["a:ready(2)"]);
    }

    #[tokio::test]
    async fn test_unload_runs_in_reverse_order() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        for id in ["p1", "p2", "p3"] {
            registry.register(TestPlugin::new(id, &log).build()).await.unwrap();
        }
        let errors = registry.unload_all().await.unwrap();
        assert!(errors.is_empty());
        assert_eq!(log.matching(":unload"), vec!["p3:unload", "p2:unload", "p1:unload"]);
        assert_eq!(registry.state("p1"), Some(PluginState::Unloaded));
    }

    #[tokio::test]
    async fn test_unload_errors_do_not_stop_siblings() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("a", &log).build()).await.unwrap();
        registry.register(TestPlugin::new("b", &log).failing_unload("stuck").build()).await.unwrap();
        registry.register(TestPlugin::new("c", &log).build()).await.unwrap();

        let errors = registry.unload_all().await.unwrap();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TrellisError::Teardown { ref plugin, .. } if plugin == "b"));
        assert_eq!(log.matching(":unload"), vec!["c:unload", "b:unload", "a:unload"]);
    }

    #[tokio::test]
    async fn test_mutation_refused_while_dispatch_in_flight() {
        let log = CallLog::default();
        let registry = PluginRegistry::new();
        registry.register(TestPlugin::new("a", &log).build()).await.unwrap();

        let guard = registry.begin_dispatch();
        let err = registry.register(TestPlugin::new("b", &log).build()).await.unwrap_err();
        assert!(matches!(err, TrellisError::RegistryBusy { in_flight: 1 }));
        assert!(registry.disable("a").is_err());
        drop(guard);

        assert_eq!(registry.in_flight(), 0);
        assert!(registry.disable("a").unwrap());
        assert!(registry.get_enabled().is_empty());
        assert_eq!(registry.plugins().len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_external_failure_fails_ready() {
        let registry = PluginRegistry::new();
        registry.defer(TrellisError::UnknownPlugin("missing".into()));
        assert!(matches!(registry.ready().await, Err(TrellisError::UnknownPlugin(_))));
        // Taken once; a second ready succeeds with no plugins.
        registry.ready().await.unwrap();
    }
}
