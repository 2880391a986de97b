//! Recording plugins for tests.
//!
//! Every lifecycle call and every resolver invocation is appended to a shared
//! [`CallLog`] as `"<id>:<event>"`, so tests can assert exact ordering.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use trellis_core::{Intent, IntentResult, PluginMeta, SurfaceProps, SurfaceResult};

use crate::definition::{Plugin, PluginDefinition};
use crate::provides::{GraphAction, IntentResolver, Provides, Resource};

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Entries containing `needle`, in order.
    pub fn matching(&self, needle: &str) -> Vec<String> {
        self.entries().into_iter().filter(|e| e.contains(needle)).collect()
    }
}

type ResolveFn = dyn Fn(&Intent) -> Result<Option<IntentResult>> + Send + Sync;

struct RecordingResolver {
    id: String,
    log: CallLog,
    resolve: Box<ResolveFn>,
}

#[async_trait]
impl IntentResolver for RecordingResolver {
    async fn resolve(&self, intent: &Intent, _plugins: &[Arc<Plugin>]) -> Result<Option<IntentResult>> {
        self.log.push(format!("{}:resolve:{}", self.id, intent.action));
        (self.resolve)(intent)
    }
}

/// Builder for a recording plugin.
pub struct TestPlugin {
    meta: PluginMeta,
    log: CallLog,
    provides: Provides,
    fail_initialize: Option<String>,
    fail_ready: Option<String>,
    fail_unload: Option<String>,
}

impl TestPlugin {
    pub fn new(id: &str, log: &CallLog) -> Self {
        Self {
            meta: PluginMeta::new(id),
            log: log.clone(),
            provides: Provides::default(),
            fail_initialize: None,
            fail_ready: None,
            fail_unload: None,
        }
    }

    pub fn with_resolver<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Intent) -> Result<Option<IntentResult>> + Send + Sync + 'static,
    {
        self.provides.intent = Some(Arc::new(RecordingResolver {
            id: self.meta.id.clone(),
            log: self.log.clone(),
            resolve: Box::new(resolve),
        }));
        self
    }

    pub fn with_surface<F>(mut self, component: F) -> Self
    where
        F: Fn(&SurfaceProps) -> Result<Option<SurfaceResult>> + Send + Sync + 'static,
    {
        self.provides = self.provides.with_surface(component);
        self
    }

    pub fn with_graph<F>(mut self, actions: F) -> Self
    where
        F: Fn(&[Arc<Plugin>]) -> Vec<GraphAction> + Send + Sync + 'static,
    {
        self.provides = self.provides.with_graph(actions);
        self
    }

    pub fn with_translations(mut self, resources: Vec<Resource>) -> Self {
        self.provides = self.provides.with_translations(resources);
        self
    }

    pub fn failing_initialize(mut self, message: &str) -> Self {
        self.fail_initialize = Some(message.to_string());
        self
    }

    pub fn failing_ready(mut self, message: &str) -> Self {
        self.fail_ready = Some(message.to_string());
        self
    }

    pub fn failing_unload(mut self, message: &str) -> Self {
        self.fail_unload = Some(message.to_string());
        self
    }

    pub fn build(self) -> Arc<dyn PluginDefinition> {
        Arc::new(self)
    }
}

#[async_trait]
impl PluginDefinition for TestPlugin {
    fn meta(&self) -> PluginMeta {
        self.meta.clone()
    }

    fn provides(&self) -> Provides {
        self.provides.clone()
    }

    async fn initialize(&self) -> Result<Provides> {
        self.log.push(format!("{}:initialize", self.meta.id));
        match &self.fail_initialize {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(Provides::default()),
        }
    }

    async fn ready(&self, plugins: &[Arc<Plugin>]) -> Result<()> {
        self.log.push(format!("{}:ready({})", self.meta.id, plugins.len()));
        match &self.fail_ready {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }

    async fn unload(&self) -> Result<()> {
        self.log.push(format!("{}:unload", self.meta.id));
        match &self.fail_unload {
            Some(message) => Err(anyhow!(message.clone())),
            None => Ok(()),
        }
    }
}
