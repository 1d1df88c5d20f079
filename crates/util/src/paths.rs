//! Well-known filesystem locations.
//!
//! Every location can be overridden through an environment variable so tests
//! and portable installs can relocate the whole tree.

use std::env;
use std::path::{Path, PathBuf};

use dirs_next::{config_dir, data_dir, data_local_dir, home_dir};

pub const CONFIG_DIR_ENV: &str = "OPSDECK_CONFIG_DIR";
pub const DATA_DIR_ENV: &str = "OPSDECK_DATA_DIR";
pub const CONFIG_PATH_ENV: &str = "OPSDECK_CONFIG";
pub const PLUGINS_DIR_ENV: &str = "OPSDECK_PLUGINS_DIR";
pub const VAULT_PATH_ENV: &str = "OPSDECK_VAULT_PATH";
pub const VAULT_KEY_PATH_ENV: &str = "OPSDECK_VAULT_KEY_PATH";
pub const LOG_PATH_ENV: &str = "OPSDECK_LOG_PATH";

const APP_DIR: &str = "opsdeck";

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }
    if let Some(rest) = trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }
    PathBuf::from(trimmed)
}

/// Same as [`expand_tilde`] for an already-built path.
pub fn expand_path(path: &Path) -> PathBuf {
    expand_tilde(&path.to_string_lossy())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(|value| expand_tilde(&value))
}

/// `~/.config/opsdeck` on most platforms.
pub fn config_root() -> PathBuf {
    env_path(CONFIG_DIR_ENV).unwrap_or_else(|| config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR))
}

/// `~/.local/share/opsdeck` on most platforms.
pub fn data_root() -> PathBuf {
    env_path(DATA_DIR_ENV).unwrap_or_else(|| data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR))
}

pub fn default_config_path() -> PathBuf {
    env_path(CONFIG_PATH_ENV).unwrap_or_else(|| config_root().join("config.yaml"))
}

pub fn default_plugins_dir() -> PathBuf {
    env_path(PLUGINS_DIR_ENV).unwrap_or_else(|| config_root().join("plugins"))
}

pub fn default_vault_path() -> PathBuf {
    env_path(VAULT_PATH_ENV).unwrap_or_else(|| data_root().join("vault.db"))
}

pub fn default_vault_key_path() -> PathBuf {
    env_path(VAULT_KEY_PATH_ENV).unwrap_or_else(|| data_root().join("vault.key"))
}

pub fn default_log_path() -> PathBuf {
    env_path(LOG_PATH_ENV).unwrap_or_else(|| {
        data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("opsdeck.log")
    })
}

/// Plain (non-secret) per-plugin settings file.
pub fn plugin_config_path(plugin_name: &str) -> PathBuf {
    config_root().join("config").join(format!("{plugin_name}.yaml"))
}
