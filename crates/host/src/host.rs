//! The plugin host: discovery, loading, activation and fault handling.
//!
//! At most one plugin is started. Switching plugins always stops the outgoing
//! one, and halts every timer its views own, before the incoming plugin's
//! `start` runs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::event::KeyEvent;
use opsdeck_types::{FailureCause, PluginState};
use opsdeck_util::{HostConfig, RefreshSettings};
use opsdeck_vault::Vault;
use opsdeck_view::{RenderSurface, RootView, UiSender, ViewId, ViewIdAllocator, ViewOp};
use tracing::{debug, error, info, trace, warn};

use crate::artifact::{self, PluginArtifact};
use crate::catalog::ModuleCatalog;
use crate::contract::{HostContext, PluginContract};
use crate::error::HostError;
use crate::lifecycle::LifecycleManager;
use crate::loader::{self, LoadedModule};
use crate::registry::{PluginRecord, PluginRegistry};

/// Host settings derived from the configuration file.
#[derive(Debug, Clone)]
pub struct HostOptions {
    pub plugins_dir: PathBuf,
    /// Directory holding `<plugin>.yaml` settings files.
    pub config_dir: PathBuf,
    pub unload_dormant: bool,
    pub disabled_plugins: Vec<String>,
    pub refresh: RefreshSettings,
}

impl HostOptions {
    pub fn new(plugins_dir: impl Into<PathBuf>, config_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
            config_dir: config_dir.into(),
            unload_dormant: false,
            disabled_plugins: Vec::new(),
            refresh: RefreshSettings::default(),
        }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self {
            plugins_dir: config.plugins_dir(),
            config_dir: opsdeck_util::paths::config_root().join("config"),
            unload_dormant: config.unload_dormant,
            disabled_plugins: config.disabled_plugins.clone(),
            refresh: config.refresh.clone(),
        }
    }

    fn is_disabled(&self, name: &str) -> bool {
        self.disabled_plugins.iter().any(|disabled| disabled == name)
    }
}

/// Outcome of a discovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub discovered: usize,
    pub loaded: usize,
    pub failed: usize,
    pub disabled: usize,
}

struct Instance {
    entry: String,
    module: Option<Box<dyn PluginContract>>,
}

struct ActivePlugin {
    name: String,
    root: RootView,
    /// The plugin faulted; its stopped views stay on screen with an error.
    faulted: bool,
}

pub struct PluginHost {
    options: HostOptions,
    catalog: ModuleCatalog,
    registry: PluginRegistry,
    lifecycle: LifecycleManager,
    instances: HashMap<String, Instance>,
    active: Option<ActivePlugin>,
    vault: Arc<Vault>,
    ui: UiSender,
    view_ids: ViewIdAllocator,
}

impl std::fmt::Debug for PluginHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHost")
            .field("options", &self.options)
            .field("catalog", &self.catalog)
            .field("registry", &self.registry)
            .field("active", &self.active_name())
            .finish_non_exhaustive()
    }
}

impl PluginHost {
    pub fn new(options: HostOptions, catalog: ModuleCatalog, vault: Arc<Vault>, ui: UiSender) -> Self {
        Self {
            options,
            catalog,
            registry: PluginRegistry::new(),
            lifecycle: LifecycleManager::new(),
            instances: HashMap::new(),
            active: None,
            vault,
            ui,
            view_ids: ViewIdAllocator::default(),
        }
    }

    pub fn options(&self) -> &HostOptions {
        &self.options
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub fn vault(&self) -> &Arc<Vault> {
        &self.vault
    }

    /// Scans the plugins directory, then loads and validates every enabled
    /// artifact. Failures disable single plugins and never abort the pass.
    pub fn discover_and_load(&mut self) -> Result<LoadSummary, HostError> {
        let found = artifact::discover(&self.options.plugins_dir)?;
        let mut summary = LoadSummary::default();
        for plugin in found {
            if self.registry.is_registered(&plugin.name) {
                continue;
            }
            summary.discovered += 1;
            self.registry
                .register(PluginRecord::new(plugin.name.clone(), plugin.artifact_path.clone()))?;

            let artifact = match artifact::read_artifact(&plugin.artifact_path) {
                Ok(artifact) => artifact,
                Err(error) => {
                    self.fail(&plugin.name, loader::artifact_failure(&error))?;
                    summary.failed += 1;
                    continue;
                }
            };
            if !artifact.enabled || self.options.is_disabled(&plugin.name) {
                self.registry.get_mut(&plugin.name)?.enabled = false;
                info!(plugin = %plugin.name, "Plugin disabled; not loading");
                summary.disabled += 1;
                continue;
            }
            if self.load(&plugin.name, &artifact)? {
                summary.loaded += 1;
            } else {
                summary.failed += 1;
            }
        }
        info!(
            discovered = summary.discovered,
            loaded = summary.loaded,
            failed = summary.failed,
            disabled = summary.disabled,
            "Plugin discovery complete"
        );
        Ok(summary)
    }

    fn load(&mut self, name: &str, artifact: &PluginArtifact) -> Result<bool, HostError> {
        match loader::instantiate(&self.catalog, &artifact.entry, name) {
            Ok(LoadedModule { instance, metadata }) => {
                let record = self.registry.get_mut(name)?;
                record.metadata = Some(metadata);
                self.lifecycle.transition(record, PluginState::Loaded)?;
                self.instances.insert(
                    name.to_string(),
                    Instance {
                        entry: artifact.entry.clone(),
                        module: Some(instance),
                    },
                );
                Ok(true)
            }
            Err(cause) => {
                self.fail(name, cause)?;
                Ok(false)
            }
        }
    }

    fn fail(&mut self, name: &str, cause: FailureCause) -> Result<(), HostError> {
        let record = self.registry.get_mut(name)?;
        self.lifecycle.fail(record, cause)?;
        self.instances.remove(name);
        Ok(())
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn active_view(&self) -> Option<&RootView> {
        self.active.as_ref().map(|active| &active.root)
    }

    pub fn active_view_mut(&mut self) -> Option<&mut RootView> {
        self.active.as_mut().map(|active| &mut active.root)
    }

    /// Whether the active plugin's views are stopped after a fault.
    pub fn active_faulted(&self) -> bool {
        self.active.as_ref().is_some_and(|active| active.faulted)
    }

    /// Stops the active plugin (if another) and starts `name`.
    pub fn activate(&mut self, name: &str) -> Result<(), HostError> {
        if self.active.as_ref().is_some_and(|active| active.name == name && !active.faulted) {
            return Ok(());
        }
        let record = self.registry.get(name).ok_or_else(|| HostError::not_found(name))?;
        if !record.is_startable() {
            return Err(HostError::NotStartable {
                name: name.to_string(),
                state: record.state,
            });
        }

        self.deactivate();

        let mut module = self.take_module(name)?;
        let context = HostContext::new(
            RenderSurface::new(name, self.ui.clone(), self.view_ids.clone()),
            self.vault.clone(),
            self.options.config_dir.join(format!("{name}.yaml")),
            self.options.refresh.clone(),
        );

        let reason = match loader::guarded(|| module.start(&context)) {
            Ok(Ok(mut root)) => {
                let record = self.registry.get_mut(name)?;
                self.lifecycle.transition(record, PluginState::Started)?;
                root.activate();
                if let Some(instance) = self.instances.get_mut(name) {
                    instance.module = Some(module);
                }
                self.active = Some(ActivePlugin {
                    name: name.to_string(),
                    root,
                    faulted: false,
                });
                info!(plugin = name, "Plugin started");
                return Ok(());
            }
            Ok(Err(error)) => error.to_string(),
            Err(panic) => format!("start panicked: {panic}"),
        };

        error!(plugin = name, %reason, "Plugin failed to start");
        if loader::guarded(|| module.stop()).is_err() {
            warn!(plugin = name, "stop() panicked after a failed start");
        }
        self.fail(name, FailureCause::StartFailed(reason.clone()))?;
        Err(HostError::StartFailed {
            name: name.to_string(),
            reason,
        })
    }

    /// Takes the dormant instance of `name`, re-instantiating it when it was unloaded.
    fn take_module(&mut self, name: &str) -> Result<Box<dyn PluginContract>, HostError> {
        let Some(instance) = self.instances.get_mut(name) else {
            return Err(HostError::not_found(name));
        };
        if let Some(module) = instance.module.take() {
            return Ok(module);
        }
        let entry = instance.entry.clone();
        debug!(plugin = name, entry = %entry, "Re-instantiating unloaded plugin");
        match loader::instantiate(&self.catalog, &entry, name) {
            Ok(loaded) => Ok(loaded.instance),
            Err(cause) => {
                let reason = cause.to_string();
                self.fail(name, cause)?;
                Err(HostError::StartFailed {
                    name: name.to_string(),
                    reason,
                })
            }
        }
    }

    /// Stops the active plugin: the plugin's `stop` first, then every timer
    /// owned by its views. Returns the name of the plugin that was stopped.
    pub fn deactivate(&mut self) -> Option<String> {
        let ActivePlugin { name, mut root, faulted } = self.active.take()?;
        if faulted {
            root.stop();
            return Some(name);
        }

        if let Some(instance) = self.instances.get_mut(&name) {
            if let Some(module) = instance.module.as_mut() {
                if let Err(panic) = loader::guarded(|| module.stop()) {
                    warn!(plugin = %name, %panic, "stop() panicked");
                }
            }
            if self.options.unload_dormant {
                instance.module = None;
                debug!(plugin = %name, "Unloaded dormant plugin");
            }
        }
        root.stop();
        if root.has_active_timers() {
            warn!(plugin = %name, "Views still report active timers after stop");
        }

        match self.registry.get_mut(&name) {
            Ok(record) => {
                if let Err(error) = self.lifecycle.transition(record, PluginState::Stopped) {
                    warn!(plugin = %name, %error, "Could not record plugin stop");
                }
            }
            Err(error) => warn!(plugin = %name, %error, "Stopped plugin is not registered"),
        }
        info!(plugin = %name, "Plugin stopped");
        Some(name)
    }

    /// Stops the active plugin and drops every instance.
    pub fn shutdown(&mut self) {
        self.deactivate();
        self.instances.clear();
        info!("Plugin host shut down");
    }

    /// A guarded background task of `plugin` panicked.
    pub fn handle_fault(&mut self, plugin: &str, message: &str) {
        error!(plugin, message, "Plugin fault");
        if let Some(active) = self.active.as_mut().filter(|active| active.name == plugin && !active.faulted) {
            if let Some(module) = self.instances.get_mut(plugin).and_then(|instance| instance.module.as_mut()) {
                if let Err(panic) = loader::guarded(|| module.stop()) {
                    warn!(plugin, %panic, "stop() panicked after a fault");
                }
            }
            active.root.stop();
            active.root.show_fault(message);
            active.faulted = true;
        }
        let already_failed = self
            .registry
            .get(plugin)
            .is_none_or(|record| record.state == PluginState::Failed);
        if already_failed {
            return;
        }
        if let Err(error) = self.fail(plugin, FailureCause::Fault(message.to_string())) {
            warn!(plugin, %error, "Could not record plugin fault");
        }
    }

    /// Runs a queued view update against the active plugin's views. A panic
    /// inside the update faults the active plugin.
    pub fn apply(&mut self, target: ViewId, op: ViewOp) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        match loader::guarded(|| active.root.apply(target, op)) {
            Ok(applied) => {
                if !applied {
                    trace!(%target, "Dropping update for a view that is no longer displayed");
                }
                applied
            }
            Err(message) => {
                let name = active.name.clone();
                self.handle_fault(&name, &format!("view update panicked: {message}"));
                true
            }
        }
    }

    /// Forwards a key to the active plugin. A panic in a key handler faults
    /// the active plugin.
    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        let Some(active) = self.active.as_mut().filter(|active| !active.faulted) else {
            return false;
        };
        match loader::guarded(|| active.root.handle_key(event)) {
            Ok(handled) => handled,
            Err(message) => {
                let name = active.name.clone();
                self.handle_fault(&name, &format!("key handler panicked: {message}"));
                true
            }
        }
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.shutdown();
        }
    }
}
