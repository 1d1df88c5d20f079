//! The interface every plugin module implements, and the capabilities the
//! host hands back to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use opsdeck_types::{LogLine, PluginMetadata, Severity};
use opsdeck_util::{ConfigError, RefreshSettings, load_plugin_settings};
use opsdeck_vault::Vault;
use opsdeck_view::{RenderSurface, RootView, UiSender, UiUpdate};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::PluginError;

/// A plugin module.
///
/// `metadata` must be pure and callable before `start`. `start` is called
/// once per activation and must return quickly: slow work belongs in
/// background refreshes. `stop` is called once per activation before the
/// instance may be dropped; calling it twice must be harmless.
pub trait PluginContract {
    fn metadata(&self) -> PluginMetadata;

    fn start(&mut self, host: &HostContext) -> Result<RootView, PluginError>;

    fn stop(&mut self);
}

/// Capability surface exposed to a plugin while it is active.
#[derive(Debug, Clone)]
pub struct HostContext {
    surface: RenderSurface,
    secrets: Arc<Vault>,
    log: PluginLogger,
    config_path: PathBuf,
    refresh: RefreshSettings,
}

impl HostContext {
    pub fn new(
        surface: RenderSurface,
        secrets: Arc<Vault>,
        config_path: PathBuf,
        refresh: RefreshSettings,
    ) -> Self {
        let log = PluginLogger::new(surface.plugin_name(), surface.ui().clone());
        Self {
            surface,
            secrets,
            log,
            config_path,
            refresh,
        }
    }

    pub fn plugin_name(&self) -> &str {
        self.surface.plugin_name()
    }

    pub fn surface(&self) -> &RenderSurface {
        &self.surface
    }

    pub fn secrets(&self) -> Arc<Vault> {
        self.secrets.clone()
    }

    pub fn log(&self) -> &PluginLogger {
        &self.log
    }

    /// `<config_dir>/<plugin>.yaml`; the file may not exist.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn load_config<T>(&self) -> Result<T, ConfigError>
    where
        T: for<'de> Deserialize<'de> + Default,
    {
        load_plugin_settings(&self.config_path)
    }

    /// Host-wide refresh cadence and timeout.
    pub fn refresh_settings(&self) -> &RefreshSettings {
        &self.refresh
    }
}

/// Writes to `tracing` and to the host's status/log pane.
#[derive(Debug, Clone)]
pub struct PluginLogger {
    plugin: Arc<str>,
    ui: UiSender,
}

impl PluginLogger {
    pub fn new(plugin: impl Into<Arc<str>>, ui: UiSender) -> Self {
        Self {
            plugin: plugin.into(),
            ui,
        }
    }

    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Info | Severity::Success => info!(plugin = %self.plugin, "{message}"),
            Severity::Warning => warn!(plugin = %self.plugin, "{message}"),
            Severity::Error => error!(plugin = %self.plugin, "{message}"),
        }
        self.ui
            .try_post(UiUpdate::Log(LogLine::new(severity, self.plugin.as_ref(), message)));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(Severity::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Severity::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use opsdeck_view::ui_queue;

    use super::*;

    #[test]
    fn logger_posts_lines_to_the_ui_queue() {
        let (tx, mut rx) = ui_queue();
        let logger = PluginLogger::new("redis", tx);
        logger.warn("connection lost");
        match rx.drain().pop() {
            Some(UiUpdate::Log(line)) => {
                assert_eq!(line.source, "redis");
                assert_eq!(line.severity, Severity::Warning);
                assert_eq!(line.message, "connection lost");
            }
            other => panic!("unexpected update: {other:?}"),
        }
    }
}
