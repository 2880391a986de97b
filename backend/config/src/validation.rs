//! Config validation: collects every problem in one pass.

use std::collections::HashSet;

use crate::schema::TrellisConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError { path: path.into(), message: message.into() });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError { path: path.into(), message: message.into() });
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn validate(config: &TrellisConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_host(config, &mut report);
    validate_limits(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_ids(path: &str, ids: &[String], report: &mut ValidationReport) {
    let mut seen = HashSet::new();
    for (i, id) in ids.iter().enumerate() {
        if id.trim().is_empty() {
            report.error(format!("{path}[{i}]"), "Plugin id cannot be empty");
        } else if !seen.insert(id.as_str()) {
            report.error(format!("{path}[{i}]"), format!("Duplicate plugin id '{id}'"));
        }
    }
}

fn validate_host(config: &TrellisConfig, report: &mut ValidationReport) {
    let host = &config.host;
    validate_ids("host.core", &host.core, report);
    validate_ids("host.defaults", &host.defaults, report);

    if host.core.is_empty() {
        report.warn("host.core", "No core plugins; the root surface will be empty");
    }
    for id in &host.defaults {
        if host.core.contains(id) {
            report.warn("host.defaults", format!("'{id}' is already a core plugin"));
        }
    }
}

fn validate_limits(config: &TrellisConfig, report: &mut ValidationReport) {
    if config.intents.max_chain_depth == Some(0) {
        report.error("intents.maxChainDepth", "Must be at least 1");
    }
    if config.intents.event_capacity == Some(0) {
        report.error("intents.eventCapacity", "Must be at least 1");
    }
    if config.surface.max_depth == Some(0) {
        report.error("surface.maxDepth", "Must be at least 1");
    }
}

/// Only bare levels are checked; full filter directives pass through.
fn validate_logging(config: &TrellisConfig, report: &mut ValidationReport) {
    let Some(level) = &config.logging.level else { return };
    let is_directive = level.contains('=') || level.contains(',');
    if !is_directive && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn("logging.level", format!("Unknown log level '{level}'"));
    }
}
