//! Application state for the host frame.
//!
//! [`App`] owns the [`PluginHost`] (and through it the active plugin's
//! views), the state of every frame component, and the focus tree. It is
//! mutated only from the UI loop.

use std::sync::Arc;

use opsdeck_host::PluginHost;
use opsdeck_types::{Effect, LogLine, Modal, Msg, Severity};
use opsdeck_util::UserPreferences;
use opsdeck_view::UiUpdate;
use opsdeck_view::theme::Theme;
use rat_focus::{Focus, FocusBuilder, FocusFlag, HasFocus};
use ratatui::layout::Rect;
use tracing::{debug, info, warn};

use crate::ui::components::{LogsState, PackageManagerState, SidebarState};

/// Lines kept in the log pane.
pub const LOG_CAPACITY: usize = 500;

const THROBBER_FRAMES: usize = 4;

pub struct App {
    pub host: PluginHost,
    pub theme: Box<dyn Theme>,
    pub sidebar: SidebarState,
    pub logs: LogsState,
    pub package_manager: PackageManagerState,
    /// Focus flag for the plugin content region.
    pub content_focus: FocusFlag,
    pub focus: Focus,
    pub open_modal: Option<Modal>,
    pub throbber_idx: usize,
    preferences: Arc<UserPreferences>,
    container: FocusFlag,
    should_quit: bool,
}

impl App {
    pub fn new(host: PluginHost, theme: Box<dyn Theme>, preferences: Arc<UserPreferences>) -> Self {
        let mut app = Self {
            host,
            theme,
            sidebar: SidebarState::default(),
            logs: LogsState::new(LOG_CAPACITY),
            package_manager: PackageManagerState::default(),
            content_focus: FocusFlag::named("opsdeck.content"),
            focus: Focus::default(),
            open_modal: None,
            throbber_idx: 0,
            preferences,
            container: FocusFlag::named("opsdeck"),
            should_quit: false,
        };
        app.focus = FocusBuilder::build_for(&app);
        match app.host.active_name().map(str::to_string) {
            Some(active) => {
                app.select_in_sidebar(&active);
                app.focus.focus(&app.content_focus);
            }
            None => app.focus.focus(&app.sidebar),
        }
        let summary = format!("{} plugins discovered", app.host.registry().len());
        app.log(Severity::Info, summary);
        app
    }

    /// Appends a host-originated line to the log pane.
    pub fn log(&mut self, severity: Severity, message: impl Into<String>) {
        self.logs.push(LogLine::new(severity, "host", message));
    }

    pub fn plugin_name_at(&self, index: usize) -> Option<String> {
        self.host.registry().records().nth(index).map(|record| record.name.clone())
    }

    fn select_in_sidebar(&mut self, name: &str) {
        if let Some(index) = self.host.registry().records().position(|record| record.name == name) {
            self.sidebar.select(index);
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn is_sidebar_focused(&self) -> bool {
        self.sidebar.focus.get()
    }

    pub fn is_content_focused(&self) -> bool {
        self.content_focus.get()
    }

    pub fn is_logs_focused(&self) -> bool {
        self.logs.is_visible && self.logs.focus.get()
    }

    /// Whether any visible view is waiting for a refresh.
    pub fn is_refreshing(&self) -> bool {
        self.host
            .active_view()
            .is_some_and(|root| root.panes().iter().any(|pane| pane.is_refreshing()))
    }

    /// Handles an application message; returns follow-up effects.
    pub fn update(&mut self, msg: &Msg) -> Vec<Effect> {
        match msg {
            Msg::Tick => {
                if self.is_refreshing() {
                    self.throbber_idx = (self.throbber_idx + 1) % THROBBER_FRAMES;
                } else {
                    self.throbber_idx = 0;
                }
            }
            Msg::Resize(width, height) => debug!(width, height, "Terminal resized"),
        }
        Vec::new()
    }

    /// Applies one update drained from the UI queue. Returns whether the
    /// frame needs a redraw.
    pub fn apply_ui_update(&mut self, update: UiUpdate) -> bool {
        match update {
            UiUpdate::Apply { target, op } => self.host.apply(target, op),
            UiUpdate::Log(line) => {
                self.logs.push(line);
                self.logs.is_visible
            }
            UiUpdate::Fault { plugin, message } => {
                self.host.handle_fault(&plugin, &message);
                self.logs
                    .push(LogLine::new(Severity::Error, plugin.as_str(), format!("fault: {message}")));
                true
            }
            UiUpdate::Redraw => true,
        }
    }

    /// Executes a side effect requested by a component.
    pub fn run_effect(&mut self, effect: Effect) {
        match effect {
            Effect::ActivatePlugin(name) => self.activate(&name),
            Effect::ShowModal(modal) => {
                if modal == Modal::PackageManager {
                    self.package_manager.list_state.select(Some(self.sidebar.selected_index()));
                }
                self.open_modal = Some(modal);
            }
            Effect::CloseModal => self.open_modal = None,
            Effect::ToggleLogs => {
                self.logs.toggle_visible();
                if !self.logs.is_visible && self.logs.focus.get() {
                    self.logs.focus.set(false);
                    self.rebuild_focus();
                    self.focus.focus(&self.sidebar);
                } else {
                    self.rebuild_focus();
                }
            }
            Effect::FocusNext => {
                self.focus.next();
            }
            Effect::FocusPrev => {
                self.focus.prev();
            }
            Effect::Quit => self.should_quit = true,
        }
    }

    /// Stops the running plugin and starts `name`, remembering the choice.
    pub fn activate(&mut self, name: &str) {
        match self.host.activate(name) {
            Ok(()) => {
                info!(plugin = name, "Activated plugin");
                self.select_in_sidebar(name);
                self.log(Severity::Success, format!("Activated {name}"));
                if let Err(error) = self.preferences.set_last_active_plugin(Some(name.to_string())) {
                    warn!(%error, "Failed to persist last active plugin");
                }
                self.focus.focus(&self.content_focus);
            }
            Err(error) => {
                warn!(plugin = name, %error, "Activation failed");
                self.log(Severity::Error, error.to_string());
            }
        }
    }

    /// Rebuilds the focus tree after regions appeared or disappeared.
    pub fn rebuild_focus(&mut self) {
        let old = std::mem::take(&mut self.focus);
        self.focus = FocusBuilder::rebuild_for(self, Some(old));
        if self.focus.focused().is_none() {
            self.focus.first();
        }
    }

    /// Stops the active plugin ahead of exit.
    pub fn shutdown(&mut self) {
        self.host.shutdown();
    }
}

impl HasFocus for App {
    fn build(&self, builder: &mut FocusBuilder) {
        let tag = builder.start(self);
        builder.leaf_widget(&self.sidebar);
        builder.leaf_widget(&self.content_focus);
        if self.logs.is_visible {
            builder.leaf_widget(&self.logs);
        }
        builder.end(tag);
    }

    fn focus(&self) -> FocusFlag {
        self.container.clone()
    }

    fn area(&self) -> Rect {
        Rect::default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use opsdeck_host::{
        HostContext, HostOptions, ModuleCatalog, PluginArtifact, PluginContract, PluginError, write_artifact,
    };
    use opsdeck_types::{PluginMetadata, PluginState};
    use opsdeck_vault::{Vault, VaultLocation};
    use opsdeck_view::theme::AnsiTheme;
    use opsdeck_view::{RootView, UiReceiver, ui_queue};
    use tempfile::TempDir;

    use super::*;

    struct Static(&'static str);

    impl PluginContract for Static {
        fn metadata(&self) -> PluginMetadata {
            PluginMetadata::new(self.0, "1.0.0")
        }

        fn start(&mut self, host: &HostContext) -> Result<RootView, PluginError> {
            let mut view = host.surface().create_view(self.0);
            view.set_headers(["Name"]);
            view.set_rows(vec![vec![format!("{}-row", self.0)]]);
            Ok(RootView::new(view).with_pane(host.surface().create_view("detail")))
        }

        fn stop(&mut self) {}
    }

    fn alpha() -> Box<dyn PluginContract> {
        Box::new(Static("alpha"))
    }

    fn beta() -> Box<dyn PluginContract> {
        Box::new(Static("beta"))
    }

    pub(crate) struct Harness {
        pub app: App,
        pub rx: UiReceiver,
        _dir: TempDir,
    }

    pub(crate) fn harness() -> Harness {
        let dir = tempfile::tempdir().expect("tempdir");
        let plugins = dir.path().join("plugins");
        write_artifact(&plugins, "alpha", &PluginArtifact::new("alpha_module")).expect("artifact");
        write_artifact(&plugins, "beta", &PluginArtifact::new("beta_module")).expect("artifact");
        let vault = Vault::open(VaultLocation::files(dir.path().join("vault.db"), dir.path().join("vault.key")))
            .expect("vault");
        let (tx, rx) = ui_queue();
        let catalog = ModuleCatalog::new().with("alpha_module", alpha).with("beta_module", beta);
        let mut host = PluginHost::new(
            HostOptions::new(plugins, dir.path().join("config")),
            catalog,
            Arc::new(vault),
            tx,
        );
        host.discover_and_load().expect("discover");
        let preferences = Arc::new(UserPreferences::ephemeral());
        let app = App::new(host, Box::new(AnsiTheme::new()), preferences);
        Harness { app, rx, _dir: dir }
    }

    #[tokio::test]
    async fn activation_switches_plugins_and_remembers_choice() {
        let mut harness = harness();
        let app = &mut harness.app;
        assert!(app.is_sidebar_focused());

        app.run_effect(Effect::ActivatePlugin("beta".into()));
        assert_eq!(app.host.active_name(), Some("beta"));
        assert_eq!(app.sidebar.selected_index(), 1);
        assert!(app.is_content_focused());
        assert_eq!(app.preferences.last_active_plugin().as_deref(), Some("beta"));

        app.run_effect(Effect::ActivatePlugin("alpha".into()));
        assert_eq!(app.host.registry().get("beta").map(|record| record.state), Some(PluginState::Stopped));
    }

    #[tokio::test]
    async fn failed_activation_is_logged() {
        let mut harness = harness();
        let app = &mut harness.app;
        app.run_effect(Effect::ActivatePlugin("ghost".into()));
        assert_eq!(app.host.active_name(), None);
        let last = app.logs.lines().last().expect("log line");
        assert_eq!(last.severity, Severity::Error);
        assert!(last.message.contains("ghost"));
    }

    #[tokio::test]
    async fn fault_updates_disable_the_plugin() {
        let mut harness = harness();
        let app = &mut harness.app;
        app.run_effect(Effect::ActivatePlugin("alpha".into()));
        assert!(app.apply_ui_update(UiUpdate::Fault {
            plugin: "alpha".into(),
            message: "refresh task panicked: boom".into(),
        }));
        assert!(app.host.active_faulted());
        assert_eq!(app.host.registry().get("alpha").map(|record| record.state), Some(PluginState::Failed));
        assert!(app.logs.lines().any(|line| line.source == "alpha" && line.message.contains("boom")));
    }

    #[tokio::test]
    async fn hiding_logs_moves_focus_off_the_pane() {
        let mut harness = harness();
        let app = &mut harness.app;
        app.focus.focus(&app.logs);
        assert!(app.is_logs_focused());
        app.run_effect(Effect::ToggleLogs);
        assert!(!app.logs.is_visible);
        assert!(app.is_sidebar_focused());
    }
}
