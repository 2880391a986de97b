use thiserror::Error;

/// Top-level error type for the Trellis host.
///
/// Plugin code reports failures with `anyhow::Error`; the host wraps them in
/// the variant matching the phase in which they happened.
#[derive(Debug, Error)]
pub enum TrellisError {
    /// A plugin failed during `initialize` or `ready`. Collected during boot
    /// and re-raised once every sibling had its chance to initialize.
    #[error("plugin '{plugin}' failed to initialize: {source}")]
    PluginInit {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// An intent resolver returned an error.
    #[error("intent '{action}' failed in plugin '{plugin}': {source}")]
    IntentResolution {
        plugin: String,
        action: String,
        #[source]
        source: anyhow::Error,
    },

    /// A surface component failed while composing a slot.
    #[error("surface '{surface}' failed to render{}: {source}", plugin_suffix(.plugin))]
    SurfaceRender {
        surface: String,
        plugin: Option<String>,
        #[source]
        source: anyhow::Error,
    },

    /// A single plugin failed to unload.
    #[error("plugin '{plugin}' failed to unload: {source}")]
    Teardown {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    /// Unload finished, but some plugins reported errors along the way.
    #[error("{} plugin(s) failed to unload", .0.len())]
    TeardownFailed(Vec<TrellisError>),

    #[error("plugin '{0}' is already registered")]
    DuplicatePlugin(String),

    #[error("unknown plugin: {0}")]
    UnknownPlugin(String),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The registry was asked to mutate while a dispatch was in flight.
    #[error("registry is busy: {in_flight} dispatch(es) in flight")]
    RegistryBusy { in_flight: usize },

    #[error("intent chain exceeded max depth of {0}")]
    ChainTooDeep(usize),

    #[error("invalid host state transition: {from} -> {to}")]
    InvalidState { from: String, to: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn plugin_suffix(plugin: &Option<String>) -> String {
    match plugin {
        Some(id) => format!(" in plugin '{id}'"),
        None => String::new(),
    }
}

impl TrellisError {
    /// The plugin this error is attributed to, if any.
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::PluginInit { plugin, .. }
            | Self::IntentResolution { plugin, .. }
            | Self::Teardown { plugin, .. } => Some(plugin),
            Self::SurfaceRender { plugin, .. } => plugin.as_deref(),
            Self::DuplicatePlugin(id) | Self::UnknownPlugin(id) => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_source_is_preserved() {
        let err = TrellisError::IntentResolution {
            plugin: "example.org/plugin/a".into(),
            action: "CREATE".into(),
            source: anyhow::anyhow!("boom"),
        };
        assert_eq!(err.source().unwrap().to_string(), "boom");
        assert_eq!(err.plugin(), Some("example.org/plugin/a"));
    }

    #[test]
    fn test_surface_render_message() {
        let with_plugin = TrellisError::SurfaceRender {
            surface: "main".into(),
            plugin: Some("p".into()),
            source: anyhow::anyhow!("bad"),
        };
        assert_eq!(with_plugin.to_string(), "surface 'main' failed to render in plugin 'p': bad");

        let without = TrellisError::SurfaceRender {
            surface: "main".into(),
            plugin: None,
            source: anyhow::anyhow!("bad"),
        };
        assert_eq!(without.to_string(), "surface 'main' failed to render: bad");
    }
}
