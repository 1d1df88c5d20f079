//! # Opsdeck terminal UI
//!
//! Hosts the active plugin's views inside a fixed frame: a sidebar listing
//! every discovered plugin, the plugin's content panes, a hints bar and a
//! toggleable log pane.
//!
//! ## Architecture
//!
//! Rendering and all view mutations happen on a single UI loop. Plugins do
//! their slow work on background tasks and post closures into the bounded
//! UI queue; the loop drains the queue every iteration and applies updates
//! in arrival order. Host-level components follow the component pattern:
//! they read and mutate [`App`] state and report side effects as
//! [`Effect`](opsdeck_types::Effect)s for the loop to execute.

mod app;
mod ui;

use std::sync::Arc;

use anyhow::Result;
use opsdeck_host::PluginHost;
use opsdeck_util::UserPreferences;
use opsdeck_view::UiReceiver;

pub use app::{App, LOG_CAPACITY};

/// Runs the dashboard until the user quits.
///
/// `ui_rx` must be the receiving end of the queue `host` was built with.
///
/// # Errors
///
/// Terminal setup or drawing failures.
pub async fn run(host: PluginHost, ui_rx: UiReceiver, preferences: Arc<UserPreferences>) -> Result<()> {
    let theme = opsdeck_view::theme::load_from_env();
    let app = App::new(host, theme, preferences);
    ui::runtime::run_app(app, ui_rx).await
}
