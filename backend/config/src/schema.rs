//! Trellis configuration schema.
//!
//! Typed for serde YAML deserialization. Optional knobs stay `Option` in the
//! file format and are filled in by [`crate::defaults`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration (`trellis.yaml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrellisConfig {
    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub intents: IntentsConfig,

    #[serde(default)]
    pub surface: SurfaceSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which plugins the host loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    /// Always loaded, cannot be disabled.
    #[serde(default)]
    pub core: Vec<String>,

    /// Optional plugins enabled when the settings store has no entry yet.
    #[serde(default)]
    pub defaults: Vec<String>,

    /// Where persisted enablement lives. Relative paths resolve against the
    /// config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentsConfig {
    /// Maximum nesting of follow-up intent batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chain_depth: Option<usize>,

    /// Capacity of the intent event broadcast channel.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceSettings {
    /// Maximum nesting of surfaces within surfaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `trellis_intents=debug`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Directory for the rolling NDJSON log. Console only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl TrellisConfig {
    pub fn max_chain_depth(&self) -> usize {
        self.intents.max_chain_depth.unwrap_or(crate::defaults::DEFAULT_MAX_CHAIN_DEPTH)
    }

    pub fn event_capacity(&self) -> usize {
        self.intents.event_capacity.unwrap_or(crate::defaults::DEFAULT_EVENT_CAPACITY)
    }

    pub fn max_surface_depth(&self) -> usize {
        self.surface.max_depth.unwrap_or(crate::defaults::DEFAULT_MAX_SURFACE_DEPTH)
    }

    pub fn log_level(&self) -> &str {
        self.logging.level.as_deref().unwrap_or(crate::defaults::DEFAULT_LOG_LEVEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_camel_case_yaml() {
        let yaml = r#"
host:
  core: [example.org/plugin/layout]
  defaults: [example.org/plugin/notes]
  settingsPath: settings.json
intents:
  maxChainDepth: 4
"#;
        let config: TrellisConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.host.core, vec!["example.org/plugin/layout"]);
        assert_eq!(config.host.settings_path, Some(PathBuf::from("settings.json")));
        assert_eq!(config.max_chain_depth(), 4);
        assert_eq!(config.max_surface_depth(), crate::defaults::DEFAULT_MAX_SURFACE_DEPTH);
    }
}
