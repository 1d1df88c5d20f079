//! Opsdeck plugin host.
//!
//! Plugins are compiled into a [`ModuleCatalog`] and enabled by artifacts
//! under the plugins directory (`<root>/<name>/<name>.plugin`). The
//! [`PluginHost`] discovers artifacts, instantiates and validates the modules
//! they name, and runs at most one of them at a time.

mod artifact;
mod catalog;
mod contract;
mod error;
mod host;
mod lifecycle;
mod loader;
mod registry;

pub use artifact::{
    ARTIFACT_EXTENSION, ArtifactError, DiscoveredPlugin, PluginArtifact, artifact_path, discover, read_artifact, write_artifact,
};
pub use catalog::{ModuleCatalog, PluginFactory};
pub use contract::{HostContext, PluginContract, PluginLogger};
pub use error::{HostError, PluginError};
pub use host::{HostOptions, LoadSummary, PluginHost};
pub use lifecycle::{LifecycleError, LifecycleManager, Transition};
pub use loader::{LoadedModule, instantiate, seed_artifacts, validate_metadata};
pub use registry::{PluginRecord, PluginRegistry, RegistryError};
