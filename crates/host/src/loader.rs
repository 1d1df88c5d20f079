//! Instantiation and contract validation.
//!
//! Module code is untrusted until it passes validation, so every call into a
//! freshly created instance runs behind `catch_unwind`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use opsdeck_types::{FailureCause, PluginMetadata};
use opsdeck_view::panic_message;
use tracing::{debug, info};

use crate::artifact::{self, ArtifactError, PluginArtifact};
use crate::catalog::ModuleCatalog;
use crate::contract::PluginContract;
use crate::error::HostError;

/// A validated, not yet started instance.
pub struct LoadedModule {
    pub instance: Box<dyn PluginContract>,
    pub metadata: PluginMetadata,
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule").field("metadata", &self.metadata).finish_non_exhaustive()
    }
}

/// Maps artifact read failures onto the lifecycle failure taxonomy.
pub fn artifact_failure(error: &ArtifactError) -> FailureCause {
    match error {
        ArtifactError::Missing { .. } => FailureCause::ContractViolation(error.to_string()),
        ArtifactError::Unreadable { .. } | ArtifactError::Malformed { .. } => FailureCause::LoadFailed(error.to_string()),
    }
}

/// Runs `call`, turning a panic into an error message.
pub fn guarded<T>(call: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(call)).map_err(panic_message)
}

/// Resolves `entry`, instantiates it and checks the module describes itself as `expected_name`.
pub fn instantiate(catalog: &ModuleCatalog, entry: &str, expected_name: &str) -> Result<LoadedModule, FailureCause> {
    let Some(factory) = catalog.resolve(entry) else {
        return Err(FailureCause::ContractViolation(format!(
            "entry `{entry}` is not provided by any compiled module"
        )));
    };
    let instance = guarded(factory)
        .map_err(|message| FailureCause::ContractViolation(format!("module `{entry}` panicked while loading: {message}")))?;
    let metadata = guarded(|| instance.metadata())
        .map_err(|message| FailureCause::ContractViolation(format!("metadata() panicked: {message}")))?;
    validate_metadata(&metadata, expected_name, std::env::consts::ARCH).map_err(FailureCause::ContractViolation)?;
    debug!(plugin = expected_name, entry, version = %metadata.version, "Module instantiated");
    Ok(LoadedModule { instance, metadata })
}

pub fn validate_metadata(metadata: &PluginMetadata, expected_name: &str, arch: &str) -> Result<(), String> {
    if metadata.name.trim().is_empty() {
        return Err("metadata has an empty name".into());
    }
    if metadata.name != expected_name {
        return Err(format!(
            "metadata name `{}` does not match plugin directory `{expected_name}`",
            metadata.name
        ));
    }
    if metadata.version.trim().is_empty() {
        return Err("metadata has an empty version".into());
    }
    if !metadata.supports_architecture(arch) {
        return Err(format!(
            "module supports {} but host runs on {arch}",
            metadata.supported_architectures.join(", ")
        ));
    }
    Ok(())
}

/// Writes an artifact for every catalog module when `root` does not exist yet.
///
/// Returns the names of the seeded plugins; an existing root is left alone.
pub fn seed_artifacts(root: &Path, catalog: &ModuleCatalog) -> Result<Vec<String>, HostError> {
    if root.exists() {
        return Ok(Vec::new());
    }
    let mut seeded = Vec::new();
    for entry in catalog.entries() {
        let Some(factory) = catalog.resolve(entry) else {
            continue;
        };
        let name = match guarded(|| factory().metadata().name) {
            Ok(name) if !name.trim().is_empty() => name,
            Ok(_) | Err(_) => {
                debug!(entry, "Skipping module without a usable name");
                continue;
            }
        };
        artifact::write_artifact(root, &name, &PluginArtifact::new(entry))?;
        seeded.push(name);
    }
    info!(path = %root.display(), count = seeded.len(), "Seeded plugin artifacts");
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use opsdeck_view::RootView;

    use super::*;
    use crate::contract::HostContext;
    use crate::error::PluginError;

    struct Named(&'static str);

    impl PluginContract for Named {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new(self.0, "1.0.0")
        }

        fn start(&mut self, _host: &HostContext) -> Result<RootView, PluginError> {
            Err(PluginError::start("not under test"))
        }

        fn stop(&mut self) {}
    }

    fn redis() -> Box<dyn PluginContract> {
        Box::new(Named("redis"))
    }

    fn exploding() -> Box<dyn PluginContract> {
        panic!("static initializer failed")
    }

    #[test]
    fn metadata_must_match_directory() {
        let catalog = ModuleCatalog::new().with("redis_module", redis);
        assert!(instantiate(&catalog, "redis_module", "redis").is_ok());
        let mismatch = instantiate(&catalog, "redis_module", "kafka").expect_err("mismatch");
        assert_eq!(mismatch.kind(), "ContractViolation");
        assert!(mismatch.message().contains("does not match"));
    }

    #[test]
    fn unknown_entry_and_panicking_factory_are_contract_violations() {
        let catalog = ModuleCatalog::new().with("boom", exploding);
        let unknown = instantiate(&catalog, "missing", "redis").expect_err("unknown");
        assert_eq!(unknown.kind(), "ContractViolation");
        let panicked = instantiate(&catalog, "boom", "boom").expect_err("panic");
        assert_eq!(panicked.kind(), "ContractViolation");
        assert!(panicked.message().contains("static initializer failed"));
    }

    #[test]
    fn validation_checks_version_and_architecture() {
        let mut metadata = PluginMetadata::new("redis", "");
        assert!(validate_metadata(&metadata, "redis", "x86_64").is_err());
        metadata.version = "1.0.0".into();
        metadata.supported_architectures = vec!["aarch64".into()];
        assert!(validate_metadata(&metadata, "redis", "x86_64").is_err());
        assert!(validate_metadata(&metadata, "redis", "aarch64").is_ok());
    }

    #[test]
    fn seeding_only_happens_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("plugins");
        let catalog = ModuleCatalog::new().with("redis_module", redis).with("boom", exploding);
        assert_eq!(seed_artifacts(&root, &catalog).expect("seed"), vec!["redis".to_string()]);
        assert!(artifact::artifact_path(&root, "redis").exists());
        assert!(seed_artifacts(&root, &catalog).expect("seed again").is_empty());
    }
}
