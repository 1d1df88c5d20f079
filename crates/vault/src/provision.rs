//! Auto-provisioning of placeholder entries and additive attribute backfill.
//!
//! A service describes the attributes it understands; an empty
//! `<service>/<environment>` group gets an `example` entry carrying every
//! attribute at its default so the expected schema is visible to whoever
//! edits the vault. Existing entries missing a newer attribute get the
//! default written back, never touching values that are already set.

use tracing::info;

use crate::entry::SecretEntry;
use crate::error::VaultError;
use crate::path::SecretPath;
use crate::store::Vault;

pub const EXAMPLE_ENTRY_NAME: &str = "example";

/// Attributes a service expects on its entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSchema {
    pub service: String,
    /// `(name, default)` pairs, in display order.
    pub attributes: Vec<(String, String)>,
    pub default_title: String,
    pub default_url: String,
    pub default_user_name: String,
}

impl ServiceSchema {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, default: impl Into<String>) -> Self {
        self.attributes.push((name.into(), default.into()));
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.default_title = title.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.default_url = url.into();
        self
    }

    pub fn user_name(mut self, user_name: impl Into<String>) -> Self {
        self.default_user_name = user_name.into();
        self
    }

    /// A placeholder entry at `path` with every attribute at its default.
    pub fn example_entry(&self, path: &SecretPath) -> SecretEntry {
        let mut entry = SecretEntry::new(path.as_str())
            .with_title(&self.default_title)
            .with_url(&self.default_url);
        entry.user_name = self.default_user_name.clone();
        entry.notes = format!("Placeholder created by opsdeck; edit or replace with real {} credentials.", self.service);
        for (name, default) in &self.attributes {
            entry.custom_attributes.insert(name.clone(), default.clone());
        }
        entry
    }

    /// Adds missing attributes to `entry`; returns whether anything changed.
    pub fn fill_missing(&self, entry: &mut SecretEntry) -> bool {
        let mut changed = false;
        for (name, default) in &self.attributes {
            if !entry.custom_attributes.contains_key(name) {
                entry.custom_attributes.insert(name.clone(), default.clone());
                changed = true;
            }
        }
        changed
    }
}

/// What a discovery pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Paths of placeholder entries created.
    pub created: Vec<String>,
    /// Paths of entries that received missing attributes.
    pub backfilled: Vec<String>,
}

impl DiscoveryReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.backfilled.is_empty()
    }
}

/// Creates `<service>/<environment>/example` when the group is empty.
///
/// Returns the created path, or `None` when the group already had entries.
pub fn ensure_example(vault: &Vault, schema: &ServiceSchema, environment: &str) -> Result<Option<String>, VaultError> {
    let group = SecretPath::from_segments([schema.service.as_str(), environment])?;
    if !vault.list(group.as_str())?.is_empty() {
        return Ok(None);
    }
    let path = group.join(EXAMPLE_ENTRY_NAME)?;
    vault.put(path.as_str(), schema.example_entry(&path))?;
    info!(path = %path, "Provisioned placeholder vault entry");
    Ok(Some(path.to_string()))
}

/// Writes back every entry under `prefix` that lacks a schema attribute.
pub fn backfill(vault: &Vault, schema: &ServiceSchema, prefix: &str) -> Result<Vec<String>, VaultError> {
    let mut updated = Vec::new();
    for mut entry in vault.entries(prefix)? {
        if schema.fill_missing(&mut entry) {
            let path = entry.path.clone();
            vault.put(&path, entry)?;
            updated.push(path);
        }
    }
    if !updated.is_empty() {
        info!(prefix, count = updated.len(), "Backfilled vault attributes");
    }
    Ok(updated)
}

/// Runs [`ensure_example`] and [`backfill`] for every environment.
pub fn discover(vault: &Vault, schema: &ServiceSchema, environments: &[&str]) -> Result<DiscoveryReport, VaultError> {
    let mut report = DiscoveryReport::default();
    for environment in environments {
        if let Some(created) = ensure_example(vault, schema, environment)? {
            report.created.push(created);
        }
        let group = SecretPath::from_segments([schema.service.as_str(), environment])?;
        report.backfilled.extend(backfill(vault, schema, group.as_str())?);
    }
    Ok(report)
}
