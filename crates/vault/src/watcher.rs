//! Picks up out-of-band edits made with an external vault editor.

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use crate::error::VaultError;
use crate::store::Vault;

/// Outcome of a reload triggered by the watcher.
#[derive(Debug)]
pub enum VaultEvent {
    Reloaded { entries: usize },
    ReloadFailed(VaultError),
}

/// Keeps the underlying file watcher alive; dropping it stops watching.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    database: PathBuf,
}

impl VaultWatcher {
    pub fn database(&self) -> &PathBuf {
        &self.database
    }
}

impl Vault {
    /// Watches the database file and reloads after external modifications.
    ///
    /// `on_event` runs on the watcher thread; writes made through this vault
    /// do not trigger it.
    pub fn watch<F>(self: &Arc<Self>, on_event: F) -> Result<VaultWatcher, VaultError>
    where
        F: Fn(VaultEvent) + Send + 'static,
    {
        let database = self.location().database.clone();
        let directory = database
            .parent()
            .map(PathBuf::from)
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = database.file_name().map(|name| name.to_os_string());
        let vault = Arc::downgrade(self);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            let event = match result {
                Ok(event) => event,
                Err(error) => {
                    warn!(error = %error, "Vault watcher error");
                    return;
                }
            };
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            let touches_database = event
                .paths
                .iter()
                .any(|path| path.file_name().map(|name| name.to_os_string()) == file_name);
            if !touches_database {
                return;
            }
            let Some(vault) = vault.upgrade() else {
                return;
            };
            match vault.reload_if_changed() {
                Ok(Some(entries)) => on_event(VaultEvent::Reloaded { entries }),
                Ok(None) => debug!("Vault file event without content change"),
                // A half-written file from an external editor is retried on the next event.
                Err(error) => on_event(VaultEvent::ReloadFailed(error)),
            }
        })
        .map_err(|error| VaultError::Watch {
            reason: error.to_string(),
        })?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|error| VaultError::Watch {
                reason: format!("{}: {error}", directory.display()),
            })?;
        debug!(path = %database.display(), "Watching vault database");
        Ok(VaultWatcher {
            _watcher: watcher,
            database,
        })
    }
}
