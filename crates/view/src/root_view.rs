use crossterm::event::KeyEvent;
use opsdeck_types::Severity;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
};

use crate::core_view::CoreView;
use crate::error::ViewError;
use crate::queue::{ViewId, ViewOp};
use crate::theme::Theme;

/// The view tree a plugin hands to the host: one or more side-by-side panes,
/// one of which has keyboard focus.
#[derive(Debug)]
pub struct RootView {
    panes: Vec<CoreView>,
    active: usize,
}

impl RootView {
    pub fn new(view: CoreView) -> Self {
        Self {
            panes: vec![view],
            active: 0,
        }
    }

    pub fn with_pane(mut self, view: CoreView) -> Self {
        self.panes.push(view);
        self
    }

    pub fn panes(&self) -> &[CoreView] {
        &self.panes
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active(&self) -> &CoreView {
        &self.panes[self.active]
    }

    pub fn active_mut(&mut self) -> &mut CoreView {
        &mut self.panes[self.active]
    }

    pub fn view_mut(&mut self, id: ViewId) -> Option<&mut CoreView> {
        self.panes.iter_mut().find(|view| view.id() == id)
    }

    /// Moves focus to the next pane; returns `false` (and resets to the first
    /// pane) when focus should leave the plugin.
    pub fn focus_next(&mut self) -> bool {
        if self.active + 1 < self.panes.len() {
            self.active += 1;
            true
        } else {
            self.active = 0;
            false
        }
    }

    pub fn focus_prev(&mut self) -> bool {
        if self.active > 0 {
            self.active -= 1;
            true
        } else {
            self.active = self.panes.len() - 1;
            false
        }
    }

    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        self.active_mut().handle_key(event)
    }

    /// Runs a queued update against its target pane; `false` when no pane matches.
    pub fn apply(&mut self, target: ViewId, op: ViewOp) -> bool {
        match self.view_mut(target) {
            Some(view) => {
                op(view);
                true
            }
            None => false,
        }
    }

    /// Dispatches the initial refresh of every pane.
    pub fn activate(&mut self) {
        for pane in &mut self.panes {
            pane.refresh();
        }
    }

    /// Halts every pane's timers and releases its handlers.
    pub fn stop(&mut self) {
        for pane in &mut self.panes {
            pane.stop();
        }
    }

    pub fn has_active_timers(&self) -> bool {
        self.panes.iter().any(CoreView::has_active_timers)
    }

    /// Visible error state after a fault in the owning plugin.
    pub fn show_fault(&mut self, message: &str) {
        for pane in &mut self.panes {
            pane.close_overlay();
            pane.set_error(&ViewError::failed(format!("plugin fault: {message}")));
            pane.set_status(Severity::Error, "Plugin disabled after a background fault; see logs.");
        }
    }

    pub fn hints(&self) -> Vec<(String, String)> {
        self.active().hints()
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &dyn Theme, focused: bool) {
        let count = self.panes.len().max(1) as u32;
        let areas = Layout::horizontal((0..count).map(|_| Constraint::Ratio(1, count))).split(area);
        let active = self.active;
        for (index, (pane, pane_area)) in self.panes.iter_mut().zip(areas.iter()).enumerate() {
            pane.render(frame, *pane_area, theme, focused && index == active);
        }
    }
}
