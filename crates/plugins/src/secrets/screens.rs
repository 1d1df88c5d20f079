//! The explorer's three screens: services, environments of a service, and
//! entries of a `<service>/<environment>` group.

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::sync::Arc;

use futures_util::FutureExt;
use opsdeck_host::PluginLogger;
use opsdeck_types::Severity;
use opsdeck_vault::{ResolvedSecret, SecretEntry, SecretPath, Vault, VaultError, ensure_example};
use opsdeck_view::{CoreView, KeyChord, RenderSurface, Rows, ViewAction, ViewError, run_blocking};
use tracing::debug;

use super::schemas;

pub const ROOT_VIEW: &str = "Services";
const DELETE_TAG: &str = "delete:";
const MASK: &str = "••••••••";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Services,
    Environments { service: String },
    Entries { service: String, environment: String },
}

impl Screen {
    /// The screen a view stack points at; the root entry is the services list.
    pub fn from_stack(stack: &[String]) -> Self {
        match stack {
            [_, service, environment, ..] => Screen::Entries {
                service: service.clone(),
                environment: environment.clone(),
            },
            [_, service] => Screen::Environments {
                service: service.clone(),
            },
            _ => Screen::Services,
        }
    }
}

/// Shared by every handler installed on the explorer's view.
pub struct Explorer {
    vault: Arc<Vault>,
    log: PluginLogger,
    surface: RenderSurface,
}

impl Explorer {
    pub fn new(vault: Arc<Vault>, log: PluginLogger, surface: RenderSurface) -> Self {
        Self { vault, log, surface }
    }

    /// Installs headers, bindings and refresh callback for the current screen.
    pub fn configure(self: &Rc<Self>, view: &mut CoreView) {
        view.clear_bindings();
        view.clear_status();
        let vault = self.vault.clone();
        match Screen::from_stack(view.view_stack()) {
            Screen::Services => {
                view.set_headers(["Service", "Environments", "Entries"]);
                view.set_refresh(move || {
                    let vault = vault.clone();
                    async move { vault.list("").map(|paths| service_rows(&paths)).map_err(ViewError::failed) }.boxed()
                });
            }
            Screen::Environments { service } => {
                view.set_headers(["Environment", "Entries", "Enabled"]);
                view.set_refresh(move || {
                    let vault = vault.clone();
                    let service = service.clone();
                    async move {
                        vault
                            .entries(&service)
                            .map(|entries| environment_rows(&entries))
                            .map_err(ViewError::failed)
                    }
                    .boxed()
                });
            }
            Screen::Entries { service, environment } => {
                view.set_headers(["Name", "Title", "URL", "User", "Enabled"]);
                view.set_refresh(move || {
                    let vault = vault.clone();
                    let service = service.clone();
                    let environment = environment.clone();
                    async move { group_rows(&vault, &service, &environment).map_err(ViewError::failed) }.boxed()
                });
                let explorer = self.clone();
                view.bind_fn(KeyChord::char('d'), "delete", move |view| explorer.confirm_delete(view));
                let explorer = self.clone();
                view.bind_fn(KeyChord::char('n'), "new example", move |view| explorer.provision_group(view));
            }
        }
    }

    fn reload(self: &Rc<Self>, view: &mut CoreView) {
        self.configure(view);
        view.show_loading();
        view.refresh();
    }

    pub fn handle(self: &Rc<Self>, view: &mut CoreView, action: ViewAction) {
        match action {
            ViewAction::Enter { row } => self.open(view, row),
            ViewAction::NavigateBack { .. } => self.reload(view),
            ViewAction::Confirmed { tag } => {
                if let Some(path) = tag.strip_prefix(DELETE_TAG) {
                    self.delete(view, path.to_string());
                }
            }
            ViewAction::Cancelled { .. } | ViewAction::RowSelected(_) | ViewAction::KeyPress(_) => {}
        }
    }

    fn open(self: &Rc<Self>, view: &mut CoreView, row: usize) {
        let Some(name) = view.rows().get(row).and_then(|cells| cells.first()).cloned() else {
            return;
        };
        match Screen::from_stack(view.view_stack()) {
            Screen::Services | Screen::Environments { .. } => {
                view.push_view(name);
                self.reload(view);
            }
            Screen::Entries { service, environment } => {
                let path = format!("{service}/{environment}/{name}");
                match self.vault.get(&path) {
                    Ok(entry) => view.show_details(path, detail_lines(&entry)),
                    Err(error) => view.set_status(Severity::Error, error.to_string()),
                }
            }
        }
    }

    fn selected_entry_path(view: &CoreView) -> Option<String> {
        let name = view.selected_cells()?.first()?.clone();
        match Screen::from_stack(view.view_stack()) {
            Screen::Entries { service, environment } => Some(format!("{service}/{environment}/{name}")),
            _ => None,
        }
    }

    fn confirm_delete(&self, view: &mut CoreView) {
        let Some(path) = Self::selected_entry_path(view) else {
            view.set_status(Severity::Warning, "Select an entry first");
            return;
        };
        view.confirm(
            "Delete entry",
            format!("Delete `{path}` from the vault? This cannot be undone."),
            format!("{DELETE_TAG}{path}"),
        );
    }

    fn delete(&self, view: &mut CoreView, path: String) {
        let vault = self.vault.clone();
        let log = self.log.clone();
        let ui = self.surface.ui().clone();
        let target = view.id();
        view.set_status(Severity::Info, format!("Deleting {path}…"));
        self.surface.spawn("delete", async move {
            let doomed = path.clone();
            let Some(outcome) = run_blocking(move || vault.delete(&doomed)).await else {
                return;
            };
            match &outcome {
                Ok(()) => log.success(format!("Deleted {path}")),
                Err(error) => log.error(format!("Delete of {path} failed: {error}")),
            }
            let _ = ui
                .apply(target, move |view| {
                    match outcome {
                        Ok(()) => view.set_status(Severity::Success, format!("Deleted {path}")),
                        Err(error) => view.set_status(Severity::Error, error.to_string()),
                    }
                    view.refresh();
                })
                .await;
        });
    }

    /// Creates the placeholder entry for the current group when it is empty.
    fn provision_group(&self, view: &mut CoreView) {
        let Screen::Entries { service, environment } = Screen::from_stack(view.view_stack()) else {
            return;
        };
        let vault = self.vault.clone();
        let log = self.log.clone();
        let ui = self.surface.ui().clone();
        let target = view.id();
        self.surface.spawn("provision-group", async move {
            let schema = schemas::schema_for(&service);
            let group = environment.clone();
            let Some(outcome) = run_blocking(move || ensure_example(&vault, &schema, &group)).await else {
                return;
            };
            let status = match outcome {
                Ok(Some(path)) => {
                    log.info(format!("Created placeholder {path}"));
                    (Severity::Success, format!("Created {path}"))
                }
                Ok(None) => (Severity::Info, format!("{service}/{environment} already has entries")),
                Err(error) => (Severity::Error, error.to_string()),
            };
            let _ = ui
                .apply(target, move |view| {
                    view.set_status(status.0, status.1);
                    view.refresh();
                })
                .await;
        });
    }
}

/// One row per service: distinct environments and entry count.
pub fn service_rows(paths: &[String]) -> Rows {
    let mut services: BTreeMap<String, (BTreeSet<String>, usize)> = BTreeMap::new();
    for raw in paths {
        let Ok(path) = SecretPath::parse(raw) else {
            debug!(path = %raw, "Skipping unparsable vault path");
            continue;
        };
        let (environments, count) = services.entry(path.service().to_string()).or_default();
        if path.depth() > 2 {
            if let Some(environment) = path.environment() {
                environments.insert(environment.to_string());
            }
        }
        *count += 1;
    }
    services
        .into_iter()
        .map(|(service, (environments, count))| vec![service, environments.len().to_string(), count.to_string()])
        .collect()
}

/// One row per environment of a service: entries and how many are enabled.
pub fn environment_rows(entries: &[SecretEntry]) -> Rows {
    let mut environments: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for entry in entries {
        let Ok(path) = SecretPath::parse(&entry.path) else {
            continue;
        };
        let Some(environment) = path.environment().filter(|_| path.depth() > 2) else {
            continue;
        };
        let (total, enabled) = environments.entry(environment.to_string()).or_default();
        *total += 1;
        if ResolvedSecret::from_entry(entry.clone()).is_enabled() {
            *enabled += 1;
        }
    }
    environments
        .into_iter()
        .map(|(environment, (total, enabled))| vec![environment, total.to_string(), format!("{enabled}/{total}")])
        .collect()
}

/// Rows for a group; an empty group is reported as an actionable error.
pub fn group_rows(vault: &Vault, service: &str, environment: &str) -> Result<Rows, VaultError> {
    let group = SecretPath::from_segments([service, environment])?;
    let entries = vault.entries(group.as_str())?;
    if entries.is_empty() {
        return Err(VaultError::empty_group(service, environment));
    }
    Ok(entries.iter().map(entry_row).collect())
}

fn entry_row(entry: &SecretEntry) -> Vec<String> {
    let name = entry.path.rsplit('/').next().unwrap_or_default().to_string();
    let enabled = if ResolvedSecret::from_entry(entry.clone()).is_enabled() {
        "yes"
    } else {
        "no"
    };
    vec![
        name,
        entry.title.clone(),
        entry.url.clone(),
        entry.user_name.clone(),
        enabled.to_string(),
    ]
}

/// Detail overlay content; the password is masked.
pub fn detail_lines(entry: &SecretEntry) -> Vec<String> {
    let resolved = ResolvedSecret::from_entry(entry.clone());
    let mut lines = vec![
        format!("Title:    {}", resolved.display_name),
        format!("URL:      {}", entry.url),
        format!(
            "Host:     {}",
            match (&resolved.host, resolved.port) {
                (Some(host), Some(port)) => format!("{host}:{port}"),
                (Some(host), None) => host.clone(),
                _ => "-".to_string(),
            }
        ),
        format!("User:     {}", entry.user_name),
        format!("Password: {}", if entry.password.is_empty() { "(empty)" } else { MASK }),
    ];
    if !entry.custom_attributes.is_empty() {
        lines.push(String::new());
        lines.push("Attributes:".to_string());
        lines.extend(
            entry
                .custom_attributes
                .iter()
                .map(|(name, value)| format!("  {name} = {value}")),
        );
    }
    if !entry.notes.trim().is_empty() {
        lines.push(String::new());
        lines.push("Notes:".to_string());
        lines.extend(entry.notes.lines().map(|line| format!("  {line}")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_follows_stack_depth() {
        let stack = |names: &[&str]| names.iter().map(|name| name.to_string()).collect::<Vec<_>>();
        assert_eq!(Screen::from_stack(&stack(&[ROOT_VIEW])), Screen::Services);
        assert_eq!(
            Screen::from_stack(&stack(&[ROOT_VIEW, "redis"])),
            Screen::Environments { service: "redis".into() }
        );
        assert_eq!(
            Screen::from_stack(&stack(&[ROOT_VIEW, "redis", "production"])),
            Screen::Entries {
                service: "redis".into(),
                environment: "production".into()
            }
        );
    }

    #[test]
    fn service_rows_count_environments_and_entries() {
        let paths = vec![
            "redis/dev/a".to_string(),
            "redis/dev/b".to_string(),
            "redis/production/a".to_string(),
            "postgres/dev/main".to_string(),
            "loose".to_string(),
        ];
        assert_eq!(
            service_rows(&paths),
            vec![
                vec!["loose".to_string(), "0".into(), "1".into()],
                vec!["postgres".to_string(), "1".into(), "1".into()],
                vec!["redis".to_string(), "2".into(), "3".into()],
            ]
        );
    }

    #[test]
    fn environment_rows_count_enabled_entries() {
        let entries = vec![
            SecretEntry::new("redis/dev/a").with_attribute("enabled", "true"),
            SecretEntry::new("redis/dev/b").with_attribute("enabled", "false"),
            SecretEntry::new("redis/staging/a"),
        ];
        assert_eq!(
            environment_rows(&entries),
            vec![
                vec!["dev".to_string(), "2".into(), "1/2".into()],
                vec!["staging".to_string(), "1".into(), "1/1".into()],
            ]
        );
    }

    #[test]
    fn details_mask_the_password() {
        let entry = SecretEntry::new("redis/dev/cache")
            .with_title("Cache")
            .with_url("redis://cache.internal:6380")
            .with_credentials("default", "hunter2")
            .with_attribute("tls", "true");
        let lines = detail_lines(&entry);
        assert!(lines.iter().any(|line| line.contains("cache.internal:6380")));
        assert!(lines.iter().any(|line| line.contains("tls = true")));
        assert!(lines.iter().all(|line| !line.contains("hunter2")));
    }
}
