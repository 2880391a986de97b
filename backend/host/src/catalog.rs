//! The plugins an application knows about, in load order.
//!
//! Definitions are produced by async factories so that a plugin's code (and
//! whatever it pulls in) is only constructed when the plugin is enabled.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use trellis_core::PluginMeta;
use trellis_plugins::PluginDefinition;

pub type PluginFactory =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn PluginDefinition>>> + Send + Sync>;

#[derive(Clone)]
pub struct CatalogEntry {
    pub meta: PluginMeta,
    factory: PluginFactory,
}

impl CatalogEntry {
    pub async fn instantiate(&self) -> Result<Arc<dyn PluginDefinition>> {
        (self.factory)().await
    }
}

/// Ordered plugin catalog. Order here is load order.
#[derive(Clone, Default)]
pub struct PluginCatalog {
    entries: Vec<CatalogEntry>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lazily constructed plugin. A later entry with the same id
    /// replaces the earlier one in place.
    pub fn add<F, Fut>(mut self, meta: PluginMeta, factory: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn PluginDefinition>>> + Send + 'static,
    {
        let entry = CatalogEntry { meta, factory: Arc::new(move || factory().boxed()) };
        match self.entries.iter_mut().find(|e| e.meta.id == entry.meta.id) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// Add an already constructed definition.
    pub fn add_definition(self, definition: Arc<dyn PluginDefinition>) -> Self {
        let meta = definition.meta();
        self.add(meta, move || {
            let definition = definition.clone();
            async move { anyhow::Ok(definition) }
        })
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.meta.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn metas(&self) -> impl Iterator<Item = &PluginMeta> {
        self.entries.iter().map(|e| &e.meta)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_plugins::testing::{CallLog, TestPlugin};

    #[tokio::test]
    async fn test_add_keeps_order_and_replaces_by_id() {
        let log = CallLog::default();
        let catalog = PluginCatalog::new()
            .add_definition(TestPlugin::new("a", &log).build())
            .add_definition(TestPlugin::new("b", &log).build())
            .add(PluginMeta::new("a").with_name("A2"), || async {
                Err::<Arc<dyn PluginDefinition>, _>(anyhow::anyhow!("not built"))
            });

        let ids: Vec<_> = catalog.metas().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(catalog.get("a").unwrap().meta.display_name(), "A2");
        assert!(catalog.get("a").unwrap().instantiate().await.is_err());
        assert_eq!(catalog.get("b").unwrap().instantiate().await.unwrap().meta().id, "b");
    }
}
