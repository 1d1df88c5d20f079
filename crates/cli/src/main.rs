use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use opsdeck_host::{HostOptions, PluginHost, seed_artifacts};
use opsdeck_plugins::builtin_catalog;
use opsdeck_util::{HostConfig, KeySourceSetting, UserPreferences, load_config, load_config_from_path, paths};
use opsdeck_vault::{KeySource, Vault, VaultLocation};
use opsdeck_view::ui_queue;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info";

/// Terminal dashboard hosting service plugins backed by a local secrets vault.
#[derive(Debug, Parser)]
#[command(name = "opsdeck", version, about)]
struct Cli {
    /// Host configuration file (defaults to $OPSDECK_CONFIG or ~/.config/opsdeck/config.yaml).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory scanned for plugin artifacts.
    #[arg(long, value_name = "DIR")]
    plugins_dir: Option<PathBuf>,

    /// Log filter written to the log file, e.g. `debug` or `opsdeck_host=trace`.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.log_level.as_deref(), &paths::default_log_path()) {
        eprintln!("opsdeck: logging disabled: {error:#}");
    }
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("Fatal error: {error:#}");
            eprintln!("opsdeck: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// File logging; the terminal belongs to the dashboard.
fn init_tracing(level: Option<&str>, log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).with_context(|| format!("invalid log filter `{level}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to install log subscriber: {error}"))
}

fn vault_location(config: &HostConfig) -> VaultLocation {
    match config.vault.key_source {
        KeySourceSetting::File => VaultLocation::files(config.vault_database(), config.vault_key_file()),
        KeySourceSetting::Keychain => VaultLocation {
            database: config.vault_database(),
            key: KeySource::keychain(),
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match cli.config.as_deref() {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    }
    .context("failed to load configuration")?;
    if let Some(dir) = cli.plugins_dir {
        config.plugins_dir = Some(dir);
    }

    let preferences = match UserPreferences::new() {
        Ok(preferences) => Arc::new(preferences),
        Err(error) => {
            warn!(%error, "Preferences unavailable; using an in-memory store");
            Arc::new(UserPreferences::ephemeral())
        }
    };

    let location = vault_location(&config);
    let vault = Vault::open(location.clone())
        .with_context(|| format!("failed to open vault {}", location.database.display()))?;
    info!(database = %location.database.display(), key = %location.key.describe(), "Vault opened");

    let catalog = builtin_catalog();
    let plugins_dir = config.plugins_dir();
    match seed_artifacts(&plugins_dir, &catalog) {
        Ok(seeded) if !seeded.is_empty() => info!(?seeded, dir = %plugins_dir.display(), "Seeded built-in plugins"),
        Ok(_) => {}
        Err(error) => warn!(%error, "Failed to seed built-in plugins"),
    }

    let (ui_tx, ui_rx) = ui_queue();
    let mut host = PluginHost::new(HostOptions::from_config(&config), catalog, Arc::new(vault), ui_tx);
    let summary = host.discover_and_load().context("plugin discovery failed")?;
    info!(?summary, "Plugins ready");

    if let Some(initial) = preferences.last_active_plugin().or_else(|| config.default_plugin.clone())
        && host.registry().is_registered(&initial)
        && let Err(error) = host.activate(&initial)
    {
        warn!(plugin = %initial, %error, "Failed to restore plugin");
    }

    opsdeck_tui::run(host, ui_rx, preferences).await
}
