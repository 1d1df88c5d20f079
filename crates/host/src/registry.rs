//! Plugin registry for managing plugin records.

use std::path::PathBuf;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use opsdeck_types::{FailureCause, PluginMetadata, PluginState};

/// Everything the host knows about one discovered plugin.
#[derive(Debug, Clone)]
pub struct PluginRecord {
    pub name: String,
    pub artifact_path: PathBuf,
    pub state: PluginState,
    /// Reported by the module; `None` until it passed validation.
    pub metadata: Option<PluginMetadata>,
    /// Set when `state` is [`PluginState::Failed`].
    pub failure: Option<FailureCause>,
    /// `false` when the artifact or the host config disabled the plugin.
    pub enabled: bool,
    pub discovered_at: DateTime<Local>,
    pub started_at: Option<DateTime<Local>>,
    pub stopped_at: Option<DateTime<Local>>,
}

impl PluginRecord {
    pub fn new(name: impl Into<String>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            artifact_path: artifact_path.into(),
            state: PluginState::Discovered,
            metadata: None,
            failure: None,
            enabled: true,
            discovered_at: Local::now(),
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn is_startable(&self) -> bool {
        self.state.is_startable()
    }

    pub fn version(&self) -> Option<&str> {
        self.metadata.as_ref().map(|metadata| metadata.version.as_str())
    }

    pub fn tags(&self) -> &[String] {
        self.metadata.as_ref().map(|metadata| metadata.tags.as_slice()).unwrap_or_default()
    }
}

/// Records in discovery order.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    records: IndexMap<String, PluginRecord>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, record: PluginRecord) -> Result<(), RegistryError> {
        if self.records.contains_key(&record.name) {
            return Err(RegistryError::AlreadyExists { name: record.name });
        }
        self.records.insert(record.name.clone(), record);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.records.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut PluginRecord, RegistryError> {
        self.records
            .get_mut(name)
            .ok_or_else(|| RegistryError::NotFound { name: name.to_string() })
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &PluginRecord> {
        self.records.values()
    }

    pub fn names(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count_in(&self, state: PluginState) -> usize {
        self.records.values().filter(|record| record.state == state).count()
    }

    /// The plugin currently occupying the content region, if any.
    pub fn started(&self) -> Option<&PluginRecord> {
        self.records.values().find(|record| record.state == PluginState::Started)
    }

    /// Case-insensitive match on name or tag.
    pub fn search(&self, query: &str) -> Vec<&PluginRecord> {
        let query = query.to_lowercase();
        self.records
            .values()
            .filter(|record| {
                record.name.to_lowercase().contains(&query)
                    || record.tags().iter().any(|tag| tag.to_lowercase().contains(&query))
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Errors that can occur in the plugin registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Plugin not found: {name}")]
    NotFound { name: String },

    #[error("Plugin already exists: {name}")]
    AlreadyExists { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, tags: &[&str]) -> PluginRecord {
        let mut record = PluginRecord::new(name, format!("/plugins/{name}/{name}.plugin"));
        let mut metadata = PluginMetadata::new(name, "1.0.0");
        metadata.tags = tags.iter().map(|tag| tag.to_string()).collect();
        record.metadata = Some(metadata);
        record
    }

    #[test]
    fn keeps_discovery_order_and_rejects_duplicates() {
        let mut registry = PluginRegistry::new();
        registry.register(record("zeta", &[])).expect("register");
        registry.register(record("alpha", &[])).expect("register");
        assert_eq!(registry.names(), vec!["zeta".to_string(), "alpha".to_string()]);
        assert!(matches!(
            registry.register(record("zeta", &[])),
            Err(RegistryError::AlreadyExists { .. })
        ));
        assert!(matches!(registry.get_mut("missing"), Err(RegistryError::NotFound { .. })));
    }

    #[test]
    fn search_matches_names_and_tags() {
        let mut registry = PluginRegistry::new();
        registry.register(record("redis", &["cache"])).expect("register");
        registry.register(record("kafka", &["queue", "Streaming"])).expect("register");
        let hits: Vec<_> = registry.search("stream").into_iter().map(|record| record.name.as_str()).collect();
        assert_eq!(hits, ["kafka"]);
        assert_eq!(registry.search("RED").len(), 1);
        assert_eq!(registry.count_in(PluginState::Discovered), 2);
        assert!(registry.started().is_none());
    }
}
