//! `trellis-config`: host configuration management.
//!
//! Provides:
//! - Typed config schema (host plugin lists, intent and surface limits, logging)
//! - YAML read and atomic write
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_raw_config, write_config};
pub use schema::{HostConfig, IntentsConfig, LoggingConfig, SurfaceSettings, TrellisConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<TrellisConfig> {
    load_and_prepare_with(path, &std::env::vars().collect()).await
}

/// [`load_and_prepare`] with an explicit environment.
pub async fn load_and_prepare_with(path: &Path, env: &HashMap<String, String>) -> Result<TrellisConfig> {
    let raw = load_raw_config(path).await?;
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;

    let config: TrellisConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;
    let mut config = apply_all_defaults(config);

    if let Some(settings) = &config.host.settings_path {
        if settings.is_relative() {
            if let Some(dir) = path.parent() {
                config.host.settings_path = Some(dir.join(settings));
            }
        }
    }

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if !report.is_valid() {
        bail!("Config at {} has {} error(s)", path.display(), report.errors.len());
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_and_prepare_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trellis.yaml");
        tokio::fs::write(
            &path,
            "host:\n  core: [\"${LAYOUT}\"]\n  settingsPath: state.json\nintents:\n  maxChainDepth: 8\n",
        )
        .await
        .unwrap();

        let env = HashMap::from([("LAYOUT".to_string(), "example.org/plugin/layout".to_string())]);
        let config = load_and_prepare_with(&path, &env).await.unwrap();
        assert_eq!(config.host.core, vec!["example.org/plugin/layout"]);
        assert_eq!(config.host.settings_path, Some(dir.path().join("state.json")));
        assert_eq!(config.max_chain_depth(), 8);
        assert_eq!(config.log_level(), "info");
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trellis.yaml");
        tokio::fs::write(&path, "host:\n  core: [a, a]\n").await.unwrap();
        let err = load_and_prepare_with(&path, &HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("1 error(s)"));
    }
}
