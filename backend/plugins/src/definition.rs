//! Plugin definitions and initialized plugins.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use trellis_core::PluginMeta;

use crate::provides::Provides;

/// What a plugin author implements.
///
/// `provides` declares the static capabilities. `initialize` may create live
/// resources and return additional capabilities, merged over the static ones.
/// `ready` runs once every plugin is initialized, so it is the place to look
/// up siblings. `unload` releases whatever `initialize` created.
#[async_trait]
pub trait PluginDefinition: Send + Sync {
    fn meta(&self) -> PluginMeta;

    fn provides(&self) -> Provides {
        Provides::default()
    }

    async fn initialize(&self) -> Result<Provides> {
        Ok(Provides::default())
    }

    async fn ready(&self, _plugins: &[Arc<Plugin>]) -> Result<()> {
        Ok(())
    }

    async fn unload(&self) -> Result<()> {
        Ok(())
    }
}

/// A definition after initialization. Immutable once registered.
pub struct Plugin {
    meta: PluginMeta,
    provides: Provides,
    pub(crate) definition: Arc<dyn PluginDefinition>,
}

impl Plugin {
    pub(crate) fn new(meta: PluginMeta, provides: Provides, definition: Arc<dyn PluginDefinition>) -> Self {
        Self { meta, provides, definition }
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    pub fn provides(&self) -> &Provides {
        &self.provides
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("meta", &self.meta)
            .field("provides", &self.provides)
            .finish()
    }
}
