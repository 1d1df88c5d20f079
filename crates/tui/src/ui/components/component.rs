//! Component system for the host frame.
//!
//! Components are self-contained pieces of the frame (sidebar, plugin
//! content, logs, package manager). They keep their persistent state on
//! [`App`] so the focus tree and the runtime can see it, handle the events
//! routed to them, and report side effects as [`Effect`]s instead of
//! reaching into the runtime.

use crossterm::event::KeyEvent;
use opsdeck_types::{Effect, Msg};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::text::Span;

use crate::app::App;

pub(crate) trait Component {
    /// Application-wide message such as a tick or resize.
    fn handle_message(&mut self, _app: &mut App, _msg: &Msg) -> Vec<Effect> {
        Vec::new()
    }

    /// Key input while this component has focus.
    fn handle_key_events(&mut self, _app: &mut App, _key: KeyEvent) -> Vec<Effect> {
        Vec::new()
    }

    /// Draws into `area`. State changes belong in the event handlers.
    fn render(&mut self, frame: &mut Frame, area: Rect, app: &mut App);

    /// Key hints shown in the hints bar while this component has focus.
    fn get_hint_spans(&self, _app: &App) -> Vec<Span<'static>> {
        Vec::new()
    }
}
