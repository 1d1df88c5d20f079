//! Log pane: host and plugin log lines, newest at the bottom.
//!
//! While unfocused the list follows the tail; focusing it freezes the view
//! so older lines can be browsed with the arrow keys.

use crossterm::event::{KeyCode, KeyEvent};
use opsdeck_types::Effect;
use opsdeck_view::theme::helpers as th;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{List, ListItem},
};

use crate::app::App;
use crate::ui::components::Component;

const PAGE_SIZE: u16 = 10;

#[derive(Debug, Default)]
pub struct LogsComponent;

impl Component for LogsComponent {
    fn handle_key_events(&mut self, app: &mut App, key: KeyEvent) -> Vec<Effect> {
        let state = &mut app.logs;
        match key.code {
            KeyCode::Up => state.list_state.select_previous(),
            KeyCode::Down => state.list_state.select_next(),
            KeyCode::PageUp => state.list_state.scroll_up_by(PAGE_SIZE),
            KeyCode::PageDown => state.list_state.scroll_down_by(PAGE_SIZE),
            KeyCode::Home => state.list_state.select_first(),
            KeyCode::End => state.follow_tail(),
            KeyCode::Esc => return vec![Effect::FocusPrev],
            _ => {}
        }
        Vec::new()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, app: &mut App) {
        let focused = app.logs.focus.get();
        if !focused {
            app.logs.follow_tail();
        }
        let theme = &*app.theme;
        let title = format!("Logs ({})", app.logs.len());
        let block = th::block(theme, Some(title.as_str()), focused);

        let items: Vec<ListItem> = app
            .logs
            .lines()
            .map(|line| {
                ListItem::new(Line::from(vec![
                    Span::styled(line.timestamp.format("%H:%M:%S ").to_string(), theme.text_muted_style()),
                    Span::styled(format!("{:<5} ", line.severity.label()), theme.severity_style(line.severity)),
                    Span::styled(format!("[{}] ", line.source), theme.text_secondary_style()),
                    Span::styled(line.message.clone(), theme.text_primary_style()),
                ]))
            })
            .collect();
        let highlight = if focused {
            th::table_selected_style(theme)
        } else {
            theme.text_primary_style()
        };
        let list = List::new(items).block(block).highlight_style(highlight);
        frame.render_stateful_widget(list, area, &mut app.logs.list_state);
    }

    fn get_hint_spans(&self, app: &App) -> Vec<Span<'static>> {
        th::build_hint_spans(&*app.theme, &[("↑/↓", "scroll"), ("End", "follow"), ("Esc", "back")])
    }
}
