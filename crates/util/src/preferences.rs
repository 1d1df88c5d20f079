//! User preference persistence for the Opsdeck dashboard.
//!
//! A tiny JSON-backed store that records lightweight state such as the last
//! active plugin. The file lives next to the host config
//! (`~/.config/opsdeck/preferences.json` on most platforms).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::paths::{config_root, expand_tilde};

/// Environment variable allowing callers to override the preferences file path.
pub const PREFERENCES_PATH_ENV: &str = "OPSDECK_PREFERENCES_PATH";

/// Default filename for the JSON payload.
pub const PREFERENCES_FILE_NAME: &str = "preferences.json";

/// Error surfaced when reading or writing preferences fails.
#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error("preferences I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preferences serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persisted preference values.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PreferencesPayload {
    /// Plugin that was active when the dashboard last quit.
    pub last_active_plugin: Option<String>,
}

/// Thread-safe preferences store backed by a JSON file.
#[derive(Debug, Default)]
pub struct UserPreferences {
    path: PathBuf,
    payload: Mutex<PreferencesPayload>,
    persist_to_disk: bool,
}

impl UserPreferences {
    /// Open the store at the default location.
    pub fn new() -> Result<Self, PreferencesError> {
        Self::at_path(default_preferences_path())
    }

    /// Open the store at an explicit path.
    pub fn at_path(path: PathBuf) -> Result<Self, PreferencesError> {
        let payload = load_payload(&path)?;
        Ok(Self {
            path,
            payload: Mutex::new(payload),
            persist_to_disk: true,
        })
    }

    /// In-memory store used when the config directory cannot be accessed.
    pub fn ephemeral() -> Self {
        Self {
            path: PathBuf::new(),
            payload: Mutex::new(PreferencesPayload::default()),
            persist_to_disk: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_active_plugin(&self) -> Option<String> {
        self.payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_active_plugin
            .clone()
    }

    pub fn set_last_active_plugin(&self, plugin_name: Option<String>) -> Result<(), PreferencesError> {
        let mut payload = self.payload.lock().unwrap_or_else(PoisonError::into_inner);
        payload.last_active_plugin = plugin_name;
        if self.persist_to_disk {
            self.save_locked(&payload)?;
        }
        Ok(())
    }

    fn save_locked(&self, payload: &PreferencesPayload) -> Result<(), PreferencesError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(payload)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

fn default_preferences_path() -> PathBuf {
    if let Ok(path) = env::var(PREFERENCES_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    config_root().join(PREFERENCES_FILE_NAME)
}

fn load_payload(path: &Path) -> Result<PreferencesPayload, PreferencesError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(payload) => Ok(payload),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse preferences file; using defaults"
                );
                Ok(PreferencesPayload::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(PreferencesPayload::default()),
        Err(error) => Err(PreferencesError::Io(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_last_active_plugin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(PREFERENCES_FILE_NAME);

        let preferences = UserPreferences::at_path(path.clone()).expect("open preferences");
        assert_eq!(preferences.last_active_plugin(), None);
        preferences
            .set_last_active_plugin(Some("secrets".into()))
            .expect("save preferences");

        let reopened = UserPreferences::at_path(path).expect("reopen preferences");
        assert_eq!(reopened.last_active_plugin().as_deref(), Some("secrets"));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(PREFERENCES_FILE_NAME);
        fs::write(&path, "{not json").expect("write garbage");
        let preferences = UserPreferences::at_path(path).expect("open preferences");
        assert_eq!(preferences.last_active_plugin(), None);
    }

    #[test]
    fn ephemeral_store_never_touches_disk() {
        let preferences = UserPreferences::ephemeral();
        preferences
            .set_last_active_plugin(Some("settings".into()))
            .expect("in-memory update");
        assert_eq!(preferences.last_active_plugin().as_deref(), Some("settings"));
        assert_eq!(preferences.path(), Path::new(""));
    }

    #[test]
    fn default_path_honors_environment_override() {
        temp_env::with_var(PREFERENCES_PATH_ENV, Some("/tmp/opsdeck-prefs.json"), || {
            assert_eq!(default_preferences_path(), PathBuf::from("/tmp/opsdeck-prefs.json"));
        });
    }
}
