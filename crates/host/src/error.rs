//! Error types for plugin hosting.

use std::path::PathBuf;

use opsdeck_types::PluginState;
use opsdeck_util::ConfigError;
use opsdeck_vault::VaultError;
use thiserror::Error;

use crate::lifecycle::LifecycleError;
use crate::registry::RegistryError;

/// Returned by a plugin's `start`.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{reason}")]
    Start { reason: String },
}

impl PluginError {
    pub fn start(reason: impl Into<String>) -> Self {
        Self::Start { reason: reason.into() }
    }
}

/// Errors surfaced by [`PluginHost`](crate::PluginHost) operations.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    #[error("plugin {name} cannot be started while {state}")]
    NotStartable { name: String, state: PluginState },

    #[error("plugin {name} failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("failed to scan plugins directory {path}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write plugin artifact {path}: {reason}")]
    Seed { path: PathBuf, reason: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl HostError {
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }
}
