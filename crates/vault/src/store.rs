//! The vault: an in-memory working copy of the decrypted database guarded by
//! a single lock, persisted atomically on every mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::crypto::{self, KeySource, MasterKey};
use crate::entry::SecretEntry;
use crate::error::VaultError;
use crate::path::SecretPath;

/// Where the vault lives on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultLocation {
    pub database: PathBuf,
    pub key: KeySource,
}

impl VaultLocation {
    /// Database and key file side by side.
    pub fn files(database: impl Into<PathBuf>, key_file: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            key: KeySource::File(key_file.into()),
        }
    }

    pub fn key_file(&self) -> Option<&Path> {
        match &self.key {
            KeySource::File(path) => Some(path),
            KeySource::Keychain { .. } => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    entries: Vec<SecretEntry>,
}

#[derive(Default)]
struct WorkingCopy {
    entries: BTreeMap<String, SecretEntry>,
    /// Envelope last read from or written to disk.
    synced_envelope: Option<String>,
}

/// Encrypted secret store keyed by hierarchical path.
pub struct Vault {
    location: VaultLocation,
    key: MasterKey,
    state: Mutex<WorkingCopy>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("location", &self.location).finish_non_exhaustive()
    }
}

impl Vault {
    /// Opens the vault, creating the key and an empty database on first run.
    ///
    /// An existing database without key material is a [`VaultError::DecryptFailed`]:
    /// a new key would never open it.
    pub fn open(location: VaultLocation) -> Result<Self, VaultError> {
        let database_exists = location.database.exists();
        let key = match crypto::read_key(&location.key)? {
            Some(key) => key,
            None if database_exists => {
                return Err(VaultError::DecryptFailed {
                    reason: format!("no key found at {} for existing database", location.key.describe()),
                });
            }
            None => {
                let key = MasterKey::generate();
                crypto::store_key(&location.key, &key)?;
                key
            }
        };

        let vault = Self {
            location,
            key,
            state: Mutex::new(WorkingCopy::default()),
        };
        if database_exists {
            vault.reload()?;
        } else {
            let mut state = vault.lock();
            vault.persist(&mut state)?;
            info!(path = %vault.location.database.display(), "Created empty vault database");
        }
        Ok(vault)
    }

    pub fn location(&self) -> &VaultLocation {
        &self.location
    }

    /// Fails with [`VaultError::NotFound`] when no entry exists at `path`.
    pub fn get(&self, path: &str) -> Result<SecretEntry, VaultError> {
        let path = SecretPath::parse(path)?;
        self.lock()
            .entries
            .get(path.as_str())
            .cloned()
            .ok_or_else(|| VaultError::not_found(path.as_str()))
    }

    /// Every path under `prefix` (segment-aware), sorted. An empty prefix lists everything.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, VaultError> {
        Ok(self.entries(prefix)?.into_iter().map(|entry| entry.path).collect())
    }

    /// Entries under `prefix`, sorted by path.
    pub fn entries(&self, prefix: &str) -> Result<Vec<SecretEntry>, VaultError> {
        let prefix = if prefix.trim().trim_matches('/').is_empty() {
            None
        } else {
            Some(SecretPath::parse(prefix)?)
        };
        let state = self.lock();
        let matches = state
            .entries
            .values()
            .filter(|entry| match &prefix {
                None => true,
                Some(prefix) => SecretPath::parse(&entry.path).is_ok_and(|path| path.starts_with(prefix)),
            })
            .cloned()
            .collect();
        Ok(matches)
    }

    /// Upserts `entry` at `path`; the in-memory change is rolled back when persisting fails.
    pub fn put(&self, path: &str, mut entry: SecretEntry) -> Result<(), VaultError> {
        let path = SecretPath::parse(path)?;
        entry.path = path.to_string();
        let mut state = self.lock();
        let previous = state.entries.insert(path.to_string(), entry);
        if let Err(error) = self.persist(&mut state) {
            match previous {
                Some(previous) => state.entries.insert(path.to_string(), previous),
                None => state.entries.remove(path.as_str()),
            };
            return Err(error);
        }
        debug!(path = %path, "Stored vault entry");
        Ok(())
    }

    /// Removes the entry at `path`; fails with [`VaultError::NotFound`] when absent.
    pub fn delete(&self, path: &str) -> Result<(), VaultError> {
        let path = SecretPath::parse(path)?;
        let mut state = self.lock();
        let Some(previous) = state.entries.remove(path.as_str()) else {
            return Err(VaultError::not_found(path.as_str()));
        };
        if let Err(error) = self.persist(&mut state) {
            state.entries.insert(path.to_string(), previous);
            return Err(error);
        }
        info!(path = %path, "Deleted vault entry");
        Ok(())
    }

    /// Re-reads the database, discarding the in-memory working copy.
    pub fn reload(&self) -> Result<usize, VaultError> {
        let mut state = self.lock();
        let raw = self.read_database()?;
        let entries = self.decode(&raw)?;
        let count = entries.len();
        state.entries = entries;
        state.synced_envelope = Some(raw);
        debug!(entries = count, "Reloaded vault");
        Ok(count)
    }

    /// Reloads only when the file differs from what was last read or written.
    pub fn reload_if_changed(&self) -> Result<Option<usize>, VaultError> {
        let mut state = self.lock();
        let raw = self.read_database()?;
        if state.synced_envelope.as_deref() == Some(raw.as_str()) {
            return Ok(None);
        }
        let entries = self.decode(&raw)?;
        let count = entries.len();
        state.entries = entries;
        state.synced_envelope = Some(raw);
        info!(entries = count, "Picked up external vault changes");
        Ok(Some(count))
    }

    /// Distinct `(service, environment)` pairs, sorted.
    pub fn groups(&self) -> Vec<(String, String)> {
        let state = self.lock();
        let groups: BTreeSet<(String, String)> = state
            .entries
            .keys()
            .filter_map(|path| SecretPath::parse(path).ok())
            .filter_map(|path| {
                path.environment()
                    .filter(|_| path.depth() > 2)
                    .map(|environment| (path.service().to_string(), environment.to_string()))
            })
            .collect();
        groups.into_iter().collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        SecretPath::parse(path).is_ok_and(|path| self.lock().entries.contains_key(path.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, WorkingCopy> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_database(&self) -> Result<String, VaultError> {
        fs::read_to_string(&self.location.database).map_err(|error| {
            if error.kind() == std::io::ErrorKind::NotFound {
                VaultError::corrupt(format!("{} is missing", self.location.database.display()))
            } else {
                VaultError::corrupt(format!("cannot read {}: {error}", self.location.database.display()))
            }
        })
    }

    fn decode(&self, raw: &str) -> Result<BTreeMap<String, SecretEntry>, VaultError> {
        let plaintext = crypto::open(&self.key, raw)?;
        let document: Document =
            serde_json::from_slice(&plaintext).map_err(|error| VaultError::corrupt(format!("invalid entries: {error}")))?;
        let mut entries = BTreeMap::new();
        for mut entry in document.entries {
            match SecretPath::parse(&entry.path) {
                Ok(path) => {
                    entry.path = path.to_string();
                    entries.insert(path.to_string(), entry);
                }
                Err(error) => warn!(error = %error, "Skipping vault entry with invalid path"),
            }
        }
        Ok(entries)
    }

    fn persist(&self, state: &mut WorkingCopy) -> Result<(), VaultError> {
        let document = Document {
            entries: state.entries.values().cloned().collect(),
        };
        let plaintext = serde_json::to_vec(&document).map_err(VaultError::write_failed)?;
        let envelope = crypto::seal(&self.key, &plaintext)?;
        write_atomically(&self.location.database, envelope.as_bytes())
            .map_err(|error| VaultError::write_failed(format!("{}: {error}", self.location.database.display())))?;
        state.synced_envelope = Some(envelope);
        Ok(())
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&directory)?;
    let mut file = NamedTempFile::new_in(&directory)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|error| error.error)?;
    Ok(())
}
