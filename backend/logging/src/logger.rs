//! Structured Logger
//!
//! Wraps `tracing` to provide console output, an optional daily-rotated
//! NDJSON file, and environment-based level control.

use std::path::Path;

use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global logger.
///
/// `RUST_LOG` overrides `level`. With `log_dir` set, records are also written
/// as JSON to `<log_dir>/trellis.log.YYYY-MM-DD`. Calling this twice is a
/// no-op, so tests and embedders can both call it.
///
/// Fails without installing anything when `log_dir` cannot be created.
pub fn init_logger(level: &str, log_dir: Option<&Path>) -> Result<(), InitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("trellis.log")
                .build(dir)?;
            Some(fmt::layer().json().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        init_logger("debug", Some(dir.path())).unwrap();
        init_logger("info", None).unwrap();
        tracing::info!("logger initialized");
    }

    #[test]
    fn test_uncreatable_log_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, "").unwrap();

        assert!(init_logger("info", Some(&file.join("sub"))).is_err());
    }
}
