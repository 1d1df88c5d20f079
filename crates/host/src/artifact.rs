//! On-disk plugin artifacts.
//!
//! Layout: `<plugins_root>/<name>/<name>.plugin`, a small YAML document naming
//! the catalog entry that implements the plugin.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::HostError;

pub const ARTIFACT_EXTENSION: &str = "plugin";

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginArtifact {
    /// Catalog symbol implementing the plugin.
    pub entry: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Free-form, ignored by the host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_yaml::Value>,
}

impl PluginArtifact {
    pub fn new(entry: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            enabled: true,
            settings: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("no artifact at {path}")]
    Missing { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// A plugin directory found under the plugins root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    pub name: String,
    pub artifact_path: PathBuf,
}

pub fn artifact_path(root: &Path, name: &str) -> PathBuf {
    root.join(name).join(format!("{name}.{ARTIFACT_EXTENSION}"))
}

/// Lists plugin directories in name order. A missing root yields nothing.
pub fn discover(root: &Path) -> Result<Vec<DiscoveredPlugin>, HostError> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %root.display(), "Plugins directory does not exist");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(HostError::Discovery {
                path: root.to_path_buf(),
                source,
            });
        }
    };

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| HostError::Discovery {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!(path = %entry.path().display(), "Skipping non UTF-8 plugin directory");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        found.push(DiscoveredPlugin {
            artifact_path: artifact_path(root, &name),
            name,
        });
    }
    found.sort_by(|left, right| left.name.cmp(&right.name));
    Ok(found)
}

pub fn read_artifact(path: &Path) -> Result<PluginArtifact, ArtifactError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            return Err(ArtifactError::Missing { path: path.to_path_buf() });
        }
        Err(source) => {
            return Err(ArtifactError::Unreadable {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let artifact: PluginArtifact = serde_yaml::from_str(&content).map_err(|error| ArtifactError::Malformed {
        path: path.to_path_buf(),
        reason: error.to_string(),
    })?;
    if artifact.entry.trim().is_empty() {
        return Err(ArtifactError::Malformed {
            path: path.to_path_buf(),
            reason: "`entry` is empty".into(),
        });
    }
    Ok(artifact)
}

/// Writes `<root>/<name>/<name>.plugin`, creating directories as needed.
pub fn write_artifact(root: &Path, name: &str, artifact: &PluginArtifact) -> Result<PathBuf, HostError> {
    let path = artifact_path(root, name);
    let seed_error = |reason: String| HostError::Seed {
        path: path.clone(),
        reason,
    };
    let yaml = serde_yaml::to_string(artifact).map_err(|error| seed_error(error.to_string()))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|error| seed_error(error.to_string()))?;
    }
    fs::write(&path, yaml).map_err(|error| seed_error(error.to_string()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_lists_directories_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["zeta", "alpha", ".hidden"] {
            fs::create_dir_all(dir.path().join(name)).expect("mkdir");
        }
        fs::write(dir.path().join("stray.txt"), "x").expect("write");

        let found = discover(dir.path()).expect("discover");
        let names: Vec<_> = found.iter().map(|plugin| plugin.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert_eq!(found[0].artifact_path, dir.path().join("alpha").join("alpha.plugin"));
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(discover(&dir.path().join("absent")).expect("discover").is_empty());
    }

    #[test]
    fn artifact_defaults_to_enabled() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_artifact(dir.path(), "secrets", &PluginArtifact::new("secrets_explorer")).expect("write");
        let artifact = read_artifact(&path).expect("read");
        assert_eq!(artifact.entry, "secrets_explorer");
        assert!(artifact.enabled);

        fs::write(&path, "entry: x\nenabled: false\n").expect("write");
        assert!(!read_artifact(&path).expect("read").enabled);
    }

    #[test]
    fn malformed_and_missing_artifacts_are_distinguished() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = artifact_path(dir.path(), "broken");
        assert!(matches!(read_artifact(&path), Err(ArtifactError::Missing { .. })));

        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(&path, "entry: [unterminated").expect("write");
        assert!(matches!(read_artifact(&path), Err(ArtifactError::Malformed { .. })));

        fs::write(&path, "entry: '  '\n").expect("write");
        assert!(matches!(read_artifact(&path), Err(ArtifactError::Malformed { .. })));
    }
}
