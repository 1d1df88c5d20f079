//! Secrets explorer: browse vault entries by service and environment,
//! provision placeholder entries and delete stale ones.

mod schemas;
mod screens;

use std::rc::Rc;
use std::sync::Arc;

use opsdeck_host::{HostContext, PluginContract, PluginError, PluginLogger};
use opsdeck_types::{PluginMetadata, Severity};
use opsdeck_vault::{Vault, VaultEvent, VaultWatcher, discover};
use opsdeck_view::{ConnectionGate, CoreView, RootView, UiSender, UiUpdate, ViewId, run_blocking};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use schemas::{builtin_schemas, schema_for};
pub use screens::{Explorer, ROOT_VIEW, Screen, detail_lines, environment_rows, group_rows, service_rows};

pub const PLUGIN_NAME: &str = "secrets";
pub const ENTRY: &str = "secrets_explorer";

/// `<config_dir>/secrets.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsSettings {
    /// Environments provisioned for every service.
    pub environments: Vec<String>,
    /// Built-in services to provision; empty means all of them.
    pub services: Vec<String>,
    pub auto_refresh: bool,
    /// Create placeholder entries for empty groups on start.
    pub provision: bool,
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            environments: vec!["development".into(), "staging".into(), "production".into()],
            services: Vec::new(),
            auto_refresh: true,
            provision: true,
        }
    }
}

#[derive(Default)]
pub struct SecretsExplorer {
    watcher: Option<VaultWatcher>,
}

pub fn factory() -> Box<dyn PluginContract> {
    Box::new(SecretsExplorer::default())
}

impl PluginContract for SecretsExplorer {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            description: "Browse and provision service credentials stored in the vault".into(),
            author: "Opsdeck".into(),
            license: "Apache-2.0".into(),
            tags: vec!["builtin".into(), "vault".into()],
            ..PluginMetadata::new(PLUGIN_NAME, env!("CARGO_PKG_VERSION"))
        }
    }

    fn start(&mut self, host: &HostContext) -> Result<RootView, PluginError> {
        let settings: SecretsSettings = host.load_config()?;
        let refresh = host.refresh_settings();
        let vault = host.secrets();

        let mut view = host.surface().create_view(ROOT_VIEW);
        view.set_refresh_timeout(refresh.timeout());
        let explorer = Rc::new(Explorer::new(vault.clone(), host.log().clone(), host.surface().clone()));
        explorer.configure(&mut view);
        let handler = explorer.clone();
        view.set_action_handler(move |view, action| handler.handle(view, action));

        let gate = ConnectionGate::always_open();
        if settings.auto_refresh {
            view.enable_auto_refresh(refresh.interval(), gate.clone());
        }
        let target = view.id();

        if settings.provision {
            spawn_provisioning(host, &settings, target);
        }

        self.watcher = match vault.watch(watch_handler(host.surface().ui().clone(), host.log().clone(), gate, target)) {
            Ok(watcher) => Some(watcher),
            Err(error) => {
                host.log().warn(format!("Vault changes made elsewhere will not show up: {error}"));
                None
            }
        };

        Ok(RootView::new(view))
    }

    fn stop(&mut self) {
        if self.watcher.take().is_some() {
            debug!(plugin = PLUGIN_NAME, "Stopped vault watcher");
        }
    }
}

fn spawn_provisioning(host: &HostContext, settings: &SecretsSettings, target: ViewId) {
    let vault: Arc<Vault> = host.secrets();
    let log = host.log().clone();
    let ui = host.surface().ui().clone();
    let schemas = schemas::selected(&settings.services);
    let environments = settings.environments.clone();
    host.surface().spawn("provision", async move {
        let worker_log = log.clone();
        let created = run_blocking(move || {
            let environments: Vec<&str> = environments.iter().map(String::as_str).collect();
            let mut created = 0;
            for schema in &schemas {
                match discover(&vault, schema, &environments) {
                    Ok(report) => {
                        created += report.created.len();
                        for path in &report.backfilled {
                            worker_log.info(format!("Backfilled missing attributes on {path}"));
                        }
                    }
                    Err(error) => worker_log.error(format!("Provisioning {} failed: {error}", schema.service)),
                }
            }
            created
        })
        .await
        .unwrap_or_default();
        if created > 0 {
            log.success(format!("Provisioned {created} placeholder entries"));
            let _ = ui
                .apply(target, |view| {
                    view.refresh();
                })
                .await;
        }
    });
}

/// Runs on the watcher thread; only queues work for the UI loop.
fn watch_handler(
    ui: UiSender,
    log: PluginLogger,
    gate: ConnectionGate,
    target: ViewId,
) -> impl Fn(VaultEvent) + Send + 'static {
    move |event| match event {
        VaultEvent::Reloaded { entries } => {
            gate.set_connected(true);
            debug!(entries, "Vault reloaded after external change");
            ui.try_post(UiUpdate::Apply {
                target,
                op: Box::new(|view: &mut CoreView| {
                    view.refresh();
                }),
            });
        }
        VaultEvent::ReloadFailed(error) => {
            gate.set_connected(false);
            warn!(%error, "Vault reload failed; auto-refresh suspended");
            log.log(Severity::Error, format!("Vault reload failed: {error}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_default_when_fields_are_missing() {
        let settings: SecretsSettings = serde_yaml::from_str("services: [redis]\n").expect("parse");
        assert_eq!(settings.services, vec!["redis".to_string()]);
        assert_eq!(settings.environments.len(), 3);
        assert!(settings.auto_refresh);
        assert!(settings.provision);
    }

    #[test]
    fn selected_schemas_filter_by_name() {
        assert_eq!(schemas::selected(&[]).len(), builtin_schemas().len());
        let picked = schemas::selected(&["postgres".into()]);
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].service, "postgres");
        assert_eq!(schema_for("memcached").attributes, vec![("enabled".to_string(), "true".to_string())]);
    }
}
