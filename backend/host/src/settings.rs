//! Persisted plugin enablement.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What the host remembers between runs. Core plugins are never listed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSettings {
    #[serde(default)]
    pub enabled: Vec<String>,
}

/// Storage for [`PluginSettings`]. `Ok(None)` means nothing saved yet.
#[async_trait]
pub trait EnablementStore: Send + Sync {
    async fn load(&self) -> Result<Option<PluginSettings>>;
    async fn save(&self, settings: &PluginSettings) -> Result<()>;
}

/// JSON file store, written atomically (temp file then rename).
#[derive(Debug, Clone)]
pub struct FileEnablementStore {
    path: PathBuf,
}

impl FileEnablementStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EnablementStore for FileEnablementStore {
    async fn load(&self) -> Result<Option<PluginSettings>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings at {}", self.path.display()))?;
        Ok(Some(settings))
    }

    async fn save(&self, settings: &PluginSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "Saved plugin settings");
        Ok(())
    }
}

/// In-process store for embedders without a settings file.
#[derive(Debug, Clone, Default)]
pub struct MemoryEnablementStore {
    settings: Arc<Mutex<Option<PluginSettings>>>,
}

impl MemoryEnablementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: PluginSettings) -> Self {
        Self { settings: Arc::new(Mutex::new(Some(settings))) }
    }
}

#[async_trait]
impl EnablementStore for MemoryEnablementStore {
    async fn load(&self) -> Result<Option<PluginSettings>> {
        Ok(self.settings.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn save(&self, settings: &PluginSettings) -> Result<()> {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings.clone());
        Ok(())
    }
}
