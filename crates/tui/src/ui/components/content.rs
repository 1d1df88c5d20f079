//! Main content region: the active plugin's panes.

use crossterm::event::{KeyCode, KeyEvent};
use opsdeck_types::Effect;
use opsdeck_view::theme::helpers as th;
use ratatui::{
    Frame,
    layout::{Alignment, Rect},
    text::Span,
    widgets::{Paragraph, Wrap},
};

use crate::app::App;
use crate::ui::components::Component;

const PLACEHOLDER: &str = "No plugin is active. Select one in the sidebar and press Enter.";

#[derive(Debug, Default)]
pub struct PluginContentComponent;

impl Component for PluginContentComponent {
    /// Forwards keys to the active plugin. `Tab`/`BackTab` move between the
    /// plugin's panes and hand focus back to the frame after the last one.
    fn handle_key_events(&mut self, app: &mut App, key: KeyEvent) -> Vec<Effect> {
        let Some(root) = app.host.active_view_mut() else {
            return match key.code {
                KeyCode::Tab => vec![Effect::FocusNext],
                KeyCode::BackTab => vec![Effect::FocusPrev],
                _ => Vec::new(),
            };
        };
        match key.code {
            KeyCode::Tab => {
                if !root.focus_next() {
                    return vec![Effect::FocusNext];
                }
            }
            KeyCode::BackTab => {
                if !root.focus_prev() {
                    return vec![Effect::FocusPrev];
                }
            }
            _ => {
                app.host.handle_key(key);
            }
        }
        Vec::new()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, app: &mut App) {
        let focused = app.content_focus.get();
        let theme = &*app.theme;
        match app.host.active_view_mut() {
            Some(root) => root.render(frame, area, theme, focused),
            None => {
                let paragraph = Paragraph::new(PLACEHOLDER)
                    .style(theme.text_muted_style())
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true })
                    .block(th::block(theme, Some("Opsdeck"), focused));
                frame.render_widget(paragraph, area);
            }
        }
    }

    fn get_hint_spans(&self, app: &App) -> Vec<Span<'static>> {
        let Some(root) = app.host.active_view() else {
            return Vec::new();
        };
        let hints = root.hints();
        let pairs: Vec<(&str, &str)> = hints.iter().map(|(key, label)| (key.as_str(), label.as_str())).collect();
        let mut spans = th::build_hint_spans(&*app.theme, &pairs);
        if root.panes().len() > 1 {
            spans.extend(th::build_hint_spans(&*app.theme, &[("Tab", "next pane")]));
        }
        spans
    }
}
