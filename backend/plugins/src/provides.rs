/// Capability contracts a plugin may implement.
///
/// The set is closed: intent resolution, surface rendering, translations and
/// graph actions. Hosts and siblings find them through the `parse_*` guards
/// instead of probing arbitrary shapes.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trellis_core::{Intent, IntentResult, SurfaceProps, SurfaceResult};

use crate::definition::Plugin;

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Handles intents. `Ok(None)` means "not mine".
#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve(&self, intent: &Intent, plugins: &[Arc<Plugin>]) -> Result<Option<IntentResult>>;
}

/// Contributes nodes to surfaces. Must not mutate plugin state.
pub trait SurfaceProvider: Send + Sync {
    fn component(&self, props: &SurfaceProps) -> Result<Option<SurfaceResult>>;
}

impl<F> SurfaceProvider for F
where
    F: Fn(&SurfaceProps) -> Result<Option<SurfaceResult>> + Send + Sync,
{
    fn component(&self, props: &SurfaceProps) -> Result<Option<SurfaceResult>> {
        self(props)
    }
}

/// Contributes invokable actions to the application graph.
pub trait GraphBuilder: Send + Sync {
    fn actions(&self, plugins: &[Arc<Plugin>]) -> Vec<GraphAction>;
}

impl<F> GraphBuilder for F
where
    F: Fn(&[Arc<Plugin>]) -> Vec<GraphAction> + Send + Sync,
{
    fn actions(&self, plugins: &[Arc<Plugin>]) -> Vec<GraphAction> {
        self(plugins)
    }
}

/// An action node: invoking it dispatches `intents` as one chained array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphAction {
    pub id: String,
    pub label: String,
    pub intents: Vec<Intent>,
}

/// Translation resource: language -> namespace -> strings. Opaque to the host.
pub type Resource = BTreeMap<String, serde_json::Value>;

/// Adapts a synchronous closure into an [`IntentResolver`].
pub struct FnResolver<F>(pub F);

impl<F> FnResolver<F>
where
    F: Fn(&Intent, &[Arc<Plugin>]) -> Result<Option<IntentResult>> + Send + Sync,
{
    pub fn new(resolve: F) -> Self {
        Self(resolve)
    }
}

#[async_trait]
impl<F> IntentResolver for FnResolver<F>
where
    F: Fn(&Intent, &[Arc<Plugin>]) -> Result<Option<IntentResult>> + Send + Sync,
{
    async fn resolve(&self, intent: &Intent, plugins: &[Arc<Plugin>]) -> Result<Option<IntentResult>> {
        (self.0)(intent, plugins)
    }
}

// ---------------------------------------------------------------------------
// Provides
// ---------------------------------------------------------------------------

/// The capabilities a plugin offers.
#[derive(Clone, Default)]
pub struct Provides {
    pub intent: Option<Arc<dyn IntentResolver>>,
    pub surface: Option<Arc<dyn SurfaceProvider>>,
    pub translations: Vec<Resource>,
    pub graph: Option<Arc<dyn GraphBuilder>>,
}

impl Provides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intent(mut self, resolver: impl IntentResolver + 'static) -> Self {
        self.intent = Some(Arc::new(resolver));
        self
    }

    pub fn with_surface(mut self, provider: impl SurfaceProvider + 'static) -> Self {
        self.surface = Some(Arc::new(provider));
        self
    }

    /// Closure form of [`Provides::with_surface`].
    pub fn with_surface_fn<F>(self, component: F) -> Self
    where
        F: Fn(&SurfaceProps) -> Result<Option<SurfaceResult>> + Send + Sync + 'static,
    {
        self.with_surface(component)
    }

    pub fn with_translations(mut self, resources: Vec<Resource>) -> Self {
        self.translations = resources;
        self
    }

    pub fn with_graph(mut self, builder: impl GraphBuilder + 'static) -> Self {
        self.graph = Some(Arc::new(builder));
        self
    }

    /// Overlay capabilities produced by `initialize`; translations accumulate.
    pub fn merge(mut self, other: Provides) -> Self {
        if other.intent.is_some() {
            self.intent = other.intent;
        }
        if other.surface.is_some() {
            self.surface = other.surface;
        }
        if other.graph.is_some() {
            self.graph = other.graph;
        }
        self.translations.extend(other.translations);
        self
    }
}

impl fmt::Debug for Provides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provides")
            .field("intent", &self.intent.is_some())
            .field("surface", &self.surface.is_some())
            .field("translations", &self.translations.len())
            .field("graph", &self.graph.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Type guards
// ---------------------------------------------------------------------------

pub fn parse_intent_plugin(plugin: &Plugin) -> Option<&Arc<dyn IntentResolver>> {
    plugin.provides().intent.as_ref()
}

pub fn parse_surface_plugin(plugin: &Plugin) -> Option<&Arc<dyn SurfaceProvider>> {
    plugin.provides().surface.as_ref()
}

pub fn parse_graph_plugin(plugin: &Plugin) -> Option<&Arc<dyn GraphBuilder>> {
    plugin.provides().graph.as_ref()
}

pub fn parse_translations_plugin(plugin: &Plugin) -> Option<&[Resource]> {
    let translations = &plugin.provides().translations;
    (!translations.is_empty()).then_some(translations.as_slice())
}

/// Every plugin passing `guard`, paired with the capability it matched.
pub fn filter_plugins<'a, T: ?Sized + 'a>(
    plugins: &'a [Arc<Plugin>],
    guard: fn(&'a Plugin) -> Option<&'a T>,
) -> Vec<(&'a Arc<Plugin>, &'a T)> {
    plugins
        .iter()
        .filter_map(|plugin| guard(plugin.as_ref()).map(|capability| (plugin, capability)))
        .collect()
}

/// The first plugin passing `guard`.
pub fn resolve_plugin<'a, T: ?Sized + 'a>(
    plugins: &'a [Arc<Plugin>],
    guard: fn(&'a Plugin) -> Option<&'a T>,
) -> Option<(&'a Arc<Plugin>, &'a T)> {
    plugins
        .iter()
        .find_map(|plugin| guard(plugin.as_ref()).map(|capability| (plugin, capability)))
}
