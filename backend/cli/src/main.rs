mod demo;
mod terminal_output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use trellis_config::defaults::DEFAULT_SETTINGS_FILE;
use trellis_config::{config_dir, config_file_path, load_and_prepare, write_config, HostConfig, TrellisConfig};
use trellis_core::Intent;
use trellis_host::{render_error, Host, RunningApp};
use trellis_logging::{init_logger, spawn_intent_event_logger};

use terminal_output::{note_error, note_info, note_success, note_warn, paint, render_table, DIM, GREEN, RED};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "Trellis: boot plugins, compose surfaces, dispatch intents")]
#[command(version)]
struct Cli {
    /// Config file [default: ~/.trellis/trellis.yaml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write NDJSON logs to this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Render the root surface
    Render {
        /// Print the tree as JSON instead of markup
        #[arg(long)]
        json: bool,
    },
    /// Dispatch an intent
    Dispatch {
        action: String,
        /// Only offer the intent to this plugin
        #[arg(short, long)]
        plugin: Option<String>,
        /// Intent payload as JSON
        #[arg(short, long)]
        data: Option<String>,
    },
    /// List catalog plugins
    Plugins,
    /// Enable an optional plugin
    Enable { id: String },
    /// Disable an optional plugin
    Disable { id: String },
    /// List graph actions, or invoke one
    Actions {
        #[arg(long)]
        invoke: Option<String>,
    },
}

fn default_config() -> TrellisConfig {
    TrellisConfig {
        host: HostConfig {
            core: vec![demo::LAYOUT.to_string()],
            defaults: vec![demo::NOTES.to_string(), demo::NAVIGATION.to_string()],
            settings_path: Some(PathBuf::from(DEFAULT_SETTINGS_FILE)),
        },
        ..Default::default()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(|| config_file_path(&config_dir()));

    if let Commands::Init { force } = cli.command {
        return init(&config_path, force).await;
    }

    let mut config = load_and_prepare(&config_path).await?;
    if config.host.core.is_empty() && config.host.defaults.is_empty() {
        config.host = default_config().host;
    }
    if config.host.settings_path.is_none() {
        let dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        config.host.settings_path = Some(dir.join(DEFAULT_SETTINGS_FILE));
    }

    let log_dir = cli.log_dir.clone().or_else(|| config.logging.dir.clone());
    init_logger(config.log_level(), log_dir.as_deref())
        .context("Failed to set up the log directory")?;
    info!(config = %config_path.display(), "Starting trellis");

    let mut host = Host::new(config, demo::catalog());
    let mut app = match host.bootstrap().await {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Boot failed");
            for node in render_error(&e)? {
                eprintln!("{node}");
            }
            return Err(e.into());
        }
    };
    let logger = spawn_intent_event_logger(app.subscribe());

    let outcome = run(&mut app, cli.command).await;

    if let Err(e) = app.unload().await {
        note_warn(&format!("Unload reported errors: {e}"));
    }
    drop(app);
    if let Err(e) = logger.await {
        error!(error = %e, "Intent event logger task failed");
    }

    if let Err(e) = &outcome {
        note_error(&format!("{e:#}"));
    }
    outcome
}

async fn run(app: &mut RunningApp, command: Commands) -> Result<()> {
    match command {
        // Handled before boot.
        Commands::Init { .. } => {}
        Commands::Render { json } => {
            let nodes = app.render_root()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&nodes)?);
            } else {
                for node in nodes {
                    println!("{node}");
                }
            }
        }
        Commands::Dispatch { action, plugin, data } => {
            let mut intent = Intent::new(action);
            if let Some(plugin) = plugin {
                intent = intent.with_plugin(plugin);
            }
            if let Some(data) = data {
                let value = serde_json::from_str(&data).context("--data must be valid JSON")?;
                intent = intent.with_data(value);
            }
            print_result(app.dispatch(intent).await?)?;
        }
        Commands::Plugins => {
            let rows: Vec<Vec<String>> = app
                .plugins()
                .into_iter()
                .map(|status| {
                    let enabled = if status.enabled { paint(GREEN, "yes") } else { paint(RED, "no") };
                    let state = status.state.map(|s| format!("{s:?}").to_lowercase());
                    vec![
                        status.meta.id.clone(),
                        status.meta.display_name().to_string(),
                        if status.core { "core".into() } else { paint(DIM, "optional") },
                        enabled,
                        state.unwrap_or_else(|| paint(DIM, "not loaded")),
                    ]
                })
                .collect();
            print!("{}", render_table(&["ID", "Name", "Kind", "Enabled", "State"], &rows));
        }
        Commands::Enable { id } => {
            let loaded = app.registry().get(&id).is_some();
            app.set_plugin_enabled(&id, true).await?;
            note_success(&format!("Enabled {id}"));
            if !loaded {
                note_info("Takes effect on the next run.");
            }
        }
        Commands::Disable { id } => {
            app.set_plugin_enabled(&id, false).await?;
            note_success(&format!("Disabled {id}"));
        }
        Commands::Actions { invoke: Some(id) } => {
            print_result(app.invoke_action(&id).await?)?;
        }
        Commands::Actions { invoke: None } => {
            let rows: Vec<Vec<String>> = app
                .actions()
                .into_iter()
                .map(|action| {
                    let intents: Vec<_> = action.intents.iter().map(|i| i.action.as_str()).collect();
                    vec![action.id, action.label, intents.join(" -> ")]
                })
                .collect();
            print!("{}", render_table(&["ID", "Label", "Intents"], &rows));
        }
    }
    Ok(())
}

fn print_result(result: Option<trellis_core::IntentResult>) -> Result<()> {
    match result {
        Some(result) => match result.data {
            Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
            None => note_success("Resolved (no data)"),
        },
        None => note_warn("No plugin resolved the intent"),
    }
    Ok(())
}

async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        note_warn(&format!("{} already exists (use --force to overwrite)", path.display()));
        return Ok(());
    }
    write_config(&default_config(), path).await?;
    note_success(&format!("Wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dispatch_arguments() {
        let cli = Cli::parse_from(["trellis", "--config", "/tmp/t.yaml", "dispatch", "CREATE", "-p", "notes", "-d", "{}"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/t.yaml")));
        match cli.command {
            Commands::Dispatch { action, plugin, data } => {
                assert_eq!(action, "CREATE");
                assert_eq!(plugin.as_deref(), Some("notes"));
                assert_eq!(data.as_deref(), Some("{}"));
            }
            _ => panic!("expected dispatch"),
        }
    }

    #[tokio::test]
    async fn init_writes_loadable_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trellis.yaml");
        init(&path, false).await.unwrap();

        let config = load_and_prepare(&path).await.unwrap();
        assert_eq!(config.host.core, vec![demo::LAYOUT]);
        assert_eq!(config.host.settings_path, Some(dir.path().join(DEFAULT_SETTINGS_FILE)));
    }
}
