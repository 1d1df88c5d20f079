//! Sidebar listing every discovered plugin with its lifecycle state.

use crossterm::event::{KeyCode, KeyEvent};
use opsdeck_host::PluginRecord;
use opsdeck_types::{Effect, PluginState, Severity};
use opsdeck_view::theme::{Theme, helpers as th};
use rat_focus::{FocusBuilder, FocusFlag, HasFocus};
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState},
};

use crate::app::App;
use crate::ui::components::Component;

#[derive(Debug)]
pub struct SidebarState {
    pub list_state: ListState,
    pub focus: FocusFlag,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            list_state: ListState::default().with_selected(Some(0)),
            focus: FocusFlag::named("opsdeck.sidebar"),
        }
    }
}

impl SidebarState {
    pub fn selected_index(&self) -> usize {
        self.list_state.selected().unwrap_or_default()
    }

    pub fn select(&mut self, index: usize) {
        self.list_state.select(Some(index));
    }

    /// Moves the selection by one, wrapping at both ends.
    pub fn cycle(&mut self, len: usize, forward: bool) {
        if len == 0 {
            return;
        }
        let current = self.selected_index().min(len - 1);
        let next = if forward { (current + 1) % len } else { (current + len - 1) % len };
        self.select(next);
    }
}

impl HasFocus for SidebarState {
    fn build(&self, builder: &mut FocusBuilder) {
        builder.leaf_widget(self);
    }

    fn focus(&self) -> FocusFlag {
        self.focus.clone()
    }

    fn area(&self) -> Rect {
        Rect::default()
    }
}

#[derive(Debug, Default)]
pub struct SidebarComponent;

fn state_style(theme: &dyn Theme, record: &PluginRecord) -> Style {
    match record.state {
        PluginState::Started => theme.severity_style(Severity::Success),
        PluginState::Failed => theme.severity_style(Severity::Error),
        PluginState::Discovered => theme.text_muted_style(),
        PluginState::Loaded | PluginState::Stopped => theme.text_primary_style(),
    }
}

impl Component for SidebarComponent {
    fn handle_key_events(&mut self, app: &mut App, key: KeyEvent) -> Vec<Effect> {
        let len = app.host.registry().len();
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => app.sidebar.cycle(len, false),
            KeyCode::Down | KeyCode::Char('j') => app.sidebar.cycle(len, true),
            KeyCode::Enter => {
                if let Some(name) = app.plugin_name_at(app.sidebar.selected_index()) {
                    return vec![Effect::ActivatePlugin(name)];
                }
            }
            KeyCode::Char('q') => return vec![Effect::Quit],
            _ => {}
        }
        Vec::new()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, app: &mut App) {
        let theme = &*app.theme;
        let focused = app.sidebar.focus.get();
        let active = app.host.active_name();
        let items: Vec<ListItem> = app
            .host
            .registry()
            .records()
            .map(|record| {
                let mut name_style = state_style(theme, record);
                if active == Some(record.name.as_str()) {
                    name_style = name_style.add_modifier(Modifier::BOLD);
                }
                ListItem::new(Line::from(vec![
                    Span::styled(format!("{} ", record.state.icon()), state_style(theme, record)),
                    Span::styled(record.name.clone(), name_style),
                ]))
            })
            .collect();
        let block = th::block(theme, Some("Plugins"), focused);
        let highlight = if focused {
            th::table_selected_style(theme)
        } else {
            Style::default().add_modifier(Modifier::UNDERLINED)
        };
        let list = List::new(items).block(block).highlight_style(highlight);
        frame.render_stateful_widget(list, area, &mut app.sidebar.list_state);
    }

    fn get_hint_spans(&self, app: &App) -> Vec<Span<'static>> {
        th::build_hint_spans(&*app.theme, &[("↑/↓", "select"), ("Enter", "activate"), ("q", "quit")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_wraps_in_both_directions() {
        let mut state = SidebarState::default();
        state.cycle(3, false);
        assert_eq!(state.selected_index(), 2);
        state.cycle(3, true);
        assert_eq!(state.selected_index(), 0);
        state.cycle(0, true);
        assert_eq!(state.selected_index(), 0);
    }
}
