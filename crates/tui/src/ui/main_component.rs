use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use opsdeck_types::{Effect, Modal, Msg};
use opsdeck_view::theme::helpers as th;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Clear, Paragraph},
};

use crate::app::App;
use crate::ui::components::{Component, LogsComponent, PackageManagerComponent, PluginContentComponent, SidebarComponent};

const THROBBER: [&str; 4] = ["⠋", "⠙", "⠹", "⠸"];
/// Widths at or above this split content and logs side by side.
const WIDE_LAYOUT_MIN: u16 = 141;
const SIDEBAR_WIDTH: u16 = 24;

/// Areas of one frame.
struct FrameLayout {
    sidebar: Rect,
    hints: Rect,
    content: Rect,
    logs: Rect,
}

/// Root component of the frame: routes keys to the focused region and
/// lays out sidebar, plugin content, hints bar, logs and modal.
#[derive(Debug, Default)]
pub struct MainView {
    sidebar: SidebarComponent,
    content: PluginContentComponent,
    logs: LogsComponent,
    package_manager: PackageManagerComponent,
}

impl MainView {
    pub fn new() -> Self {
        Self::default()
    }

    fn layout(app: &App, area: Rect) -> FrameLayout {
        let [sidebar, wrapper] = Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)]).areas(area);
        let [main, hints] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(wrapper);

        let constraints = if app.logs.is_visible {
            if main.width >= WIDE_LAYOUT_MIN {
                [Constraint::Percentage(70), Constraint::Fill(1)]
            } else {
                [Constraint::Percentage(75), Constraint::Fill(1)]
            }
        } else {
            [Constraint::Percentage(100), Constraint::Length(0)]
        };
        let [content, logs] = if main.width >= WIDE_LAYOUT_MIN {
            Layout::horizontal(constraints).areas(main)
        } else {
            Layout::vertical(constraints).areas(main)
        };
        FrameLayout {
            sidebar,
            hints,
            content,
            logs,
        }
    }

    fn render_modal(&mut self, frame: &mut Frame, area: Rect, app: &mut App) {
        frame.render_widget(Block::default().style(app.theme.modal_background_style()).dim(), area);
        let modal_area = th::centered_rect(80, 70, area);
        frame.render_widget(Clear, modal_area);
        let [body, hints] = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(modal_area);
        let hint_line = Line::from(self.package_manager.get_hint_spans(app));
        frame.render_widget(
            Paragraph::new(hint_line).style(app.theme.text_muted_style().bg(app.theme.roles().background)),
            hints,
        );
        self.package_manager.render(frame, body, app);
    }
}

impl Component for MainView {
    fn handle_message(&mut self, app: &mut App, msg: &Msg) -> Vec<Effect> {
        app.update(msg)
    }

    fn handle_key_events(&mut self, app: &mut App, key: KeyEvent) -> Vec<Effect> {
        if app.open_modal.is_some() {
            return self.package_manager.handle_key_events(app, key);
        }

        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('c') | KeyCode::Char('q') => return vec![Effect::Quit],
                KeyCode::Char('p') => return vec![Effect::ShowModal(Modal::PackageManager)],
                KeyCode::Char('l') => return vec![Effect::ToggleLogs],
                _ => {}
            }
        }

        if app.is_sidebar_focused() {
            return match key.code {
                KeyCode::Tab => vec![Effect::FocusNext],
                KeyCode::BackTab => vec![Effect::FocusPrev],
                _ => self.sidebar.handle_key_events(app, key),
            };
        }

        if app.is_logs_focused() {
            return match key.code {
                KeyCode::Tab => vec![Effect::FocusNext],
                KeyCode::BackTab => vec![Effect::FocusPrev],
                _ => self.logs.handle_key_events(app, key),
            };
        }

        self.content.handle_key_events(app, key)
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, app: &mut App) {
        frame.render_widget(
            Paragraph::new("").style(Style::default().bg(app.theme.roles().background)),
            area,
        );

        let layout = Self::layout(app, area);
        self.sidebar.render(frame, layout.sidebar, app);
        self.content.render(frame, layout.content, app);
        if app.logs.is_visible {
            self.logs.render(frame, layout.logs, app);
        }

        let hints = Paragraph::new(Line::from(self.get_hint_spans(app))).style(app.theme.text_muted_style());
        frame.render_widget(hints, layout.hints);

        if app.open_modal.is_some() {
            self.render_modal(frame, area, app);
        }
    }

    fn get_hint_spans(&self, app: &App) -> Vec<Span<'static>> {
        let theme = &*app.theme;
        let mut spans = Vec::new();
        if app.is_refreshing() {
            spans.push(Span::styled(
                format!("{} ", THROBBER[app.throbber_idx % THROBBER.len()]),
                theme.accent_primary_style(),
            ));
        }
        spans.push(Span::styled("Hints: ", theme.text_muted_style()));

        if app.is_sidebar_focused() {
            spans.extend(self.sidebar.get_hint_spans(app));
        } else if app.is_logs_focused() {
            spans.extend(self.logs.get_hint_spans(app));
        } else {
            spans.extend(self.content.get_hint_spans(app));
        }

        spans.extend(th::build_hint_spans(
            theme,
            &[("Tab", "focus"), ("Ctrl+P", "plugins"), ("Ctrl+L", "logs"), ("Ctrl+Q", "quit")],
        ));
        spans
    }
}
