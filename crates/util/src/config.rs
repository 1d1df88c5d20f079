//! Host configuration (`~/.config/opsdeck/config.yaml`).
//!
//! Every field is optional; a missing file yields the defaults. Paths may use
//! a leading `~`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::paths::{self, expand_path};

const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 30;
const DEFAULT_REFRESH_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Where the vault master key lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySourceSetting {
    /// A key file next to the database.
    #[default]
    File,
    /// The OS keychain.
    Keychain,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    pub database: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub key_source: KeySourceSetting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshSettings {
    pub interval_secs: u64,
    pub timeout_secs: u64,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
        }
    }
}

impl RefreshSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub plugins_dir: Option<PathBuf>,
    pub vault: VaultSettings,
    pub refresh: RefreshSettings,
    /// Drop stopped plugin instances instead of keeping them dormant.
    pub unload_dormant: bool,
    /// Plugins that are discovered but never loaded.
    pub disabled_plugins: Vec<String>,
    /// Plugin activated at startup when no preference was saved.
    pub default_plugin: Option<String>,
}

impl HostConfig {
    pub fn plugins_dir(&self) -> PathBuf {
        self.plugins_dir
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(paths::default_plugins_dir)
    }

    pub fn vault_database(&self) -> PathBuf {
        self.vault
            .database
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(paths::default_vault_path)
    }

    pub fn vault_key_file(&self) -> PathBuf {
        self.vault
            .key_file
            .as_deref()
            .map(expand_path)
            .unwrap_or_else(paths::default_vault_key_path)
    }

    pub fn is_disabled(&self, plugin_name: &str) -> bool {
        self.disabled_plugins.iter().any(|name| name == plugin_name)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh.interval_secs == 0 {
            return Err(ConfigError::Invalid("refresh.interval_secs must be greater than zero".into()));
        }
        if self.refresh.timeout_secs == 0 {
            return Err(ConfigError::Invalid("refresh.timeout_secs must be greater than zero".into()));
        }
        Ok(())
    }
}

/// Loads the host configuration from the default location.
pub fn load_config() -> Result<HostConfig, ConfigError> {
    load_config_from_path(&paths::default_config_path())
}

/// Loads the host configuration from a specific path; a missing file yields defaults.
pub fn load_config_from_path(path: &Path) -> Result<HostConfig, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No host config found; using defaults");
            return Ok(HostConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(HostConfig::default());
    }
    let config: HostConfig = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Reads an optional per-plugin YAML settings file; a missing file yields `T::default()`.
pub fn load_plugin_settings<T>(path: &Path) -> Result<T, ConfigError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(T::default()),
        Ok(content) => serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = load_config_from_path(&dir.path().join("absent.yaml")).expect("defaults");
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.refresh.interval(), Duration::from_secs(30));
        assert_eq!(config.refresh.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn parses_partial_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "plugins_dir: /opt/opsdeck/plugins\nvault:\n  key_source: keychain\nrefresh:\n  interval_secs: 5\ndisabled_plugins: [kafka]\n",
        )
        .expect("write config");

        let config = load_config_from_path(&path).expect("parse config");
        assert_eq!(config.plugins_dir(), PathBuf::from("/opt/opsdeck/plugins"));
        assert_eq!(config.vault.key_source, KeySourceSetting::Keychain);
        assert_eq!(config.refresh.interval_secs, 5);
        assert_eq!(config.refresh.timeout_secs, 15);
        assert!(config.is_disabled("kafka"));
        assert!(!config.is_disabled("redis"));
    }

    #[test]
    fn rejects_zero_interval() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "refresh:\n  interval_secs: 0\n").expect("write config");
        assert!(matches!(load_config_from_path(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.yaml");
        fs::write(&path, "refresh: [not, a, map]\n").expect("write config");
        let error = load_config_from_path(&path).expect_err("invalid yaml");
        assert!(error.to_string().contains("config.yaml"));
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct ExampleSettings {
        #[serde(default)]
        page_size: usize,
    }

    #[test]
    fn plugin_settings_default_when_absent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings: ExampleSettings = load_plugin_settings(&dir.path().join("redis.yaml")).expect("defaults");
        assert_eq!(settings, ExampleSettings::default());

        let path = dir.path().join("kafka.yaml");
        fs::write(&path, "page_size: 50\n").expect("write settings");
        let settings: ExampleSettings = load_plugin_settings(&path).expect("parse settings");
        assert_eq!(settings.page_size, 50);
    }
}
