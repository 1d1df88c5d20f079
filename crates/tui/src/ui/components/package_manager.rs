//! Package manager overlay: a read-only inventory of discovered plugins.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use opsdeck_host::PluginRecord;
use opsdeck_types::Effect;
use opsdeck_view::theme::helpers as th;
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph, Wrap},
};

use crate::app::App;
use crate::ui::components::Component;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug)]
pub struct PackageManagerState {
    pub list_state: ListState,
}

impl Default for PackageManagerState {
    fn default() -> Self {
        Self {
            list_state: ListState::default().with_selected(Some(0)),
        }
    }
}

/// `(label, value)` rows describing `record`.
pub fn detail_rows(record: &PluginRecord) -> Vec<(&'static str, String)> {
    let metadata = record.metadata.clone().unwrap_or_default();
    let or_dash = |value: &str| if value.is_empty() { "-".to_string() } else { value.to_string() };
    let join = |values: &[String]| if values.is_empty() { "-".to_string() } else { values.join(", ") };
    vec![
        ("Name", record.name.clone()),
        ("Version", or_dash(&metadata.version)),
        ("State", record.state.to_string()),
        ("Enabled", if record.enabled { "yes" } else { "no" }.to_string()),
        ("Description", or_dash(&metadata.description)),
        ("Author", or_dash(&metadata.author)),
        ("License", or_dash(&metadata.license)),
        ("Tags", join(&metadata.tags)),
        (
            "Architectures",
            if metadata.supported_architectures.is_empty() {
                "any".to_string()
            } else {
                metadata.supported_architectures.join(", ")
            },
        ),
        ("Last updated", metadata.last_updated.unwrap_or_else(|| "-".into())),
        ("URL", metadata.url.unwrap_or_else(|| "-".into())),
        ("Artifact", record.artifact_path.display().to_string()),
        ("Discovered", record.discovered_at.format(TIME_FORMAT).to_string()),
        (
            "Started",
            record
                .started_at
                .map(|at| at.format(TIME_FORMAT).to_string())
                .unwrap_or_else(|| "-".into()),
        ),
        (
            "Stopped",
            record
                .stopped_at
                .map(|at| at.format(TIME_FORMAT).to_string())
                .unwrap_or_else(|| "-".into()),
        ),
        (
            "Failure",
            record.failure.as_ref().map(ToString::to_string).unwrap_or_else(|| "-".into()),
        ),
    ]
}

#[derive(Debug, Default)]
pub struct PackageManagerComponent;

impl Component for PackageManagerComponent {
    fn handle_key_events(&mut self, app: &mut App, key: KeyEvent) -> Vec<Effect> {
        let len = app.host.registry().len();
        let state = &mut app.package_manager.list_state;
        match key.code {
            KeyCode::Up | KeyCode::Char('k') if len > 0 => {
                let current = state.selected().unwrap_or_default().min(len - 1);
                state.select(Some((current + len - 1) % len));
            }
            KeyCode::Down | KeyCode::Char('j') if len > 0 => {
                let current = state.selected().unwrap_or_default().min(len - 1);
                state.select(Some((current + 1) % len));
            }
            KeyCode::Esc | KeyCode::Char('q') => return vec![Effect::CloseModal],
            KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => return vec![Effect::CloseModal],
            _ => {}
        }
        Vec::new()
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, app: &mut App) {
        let theme = &*app.theme;
        let block = th::block(theme, Some("Package manager"), true);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let [list_area, details_area] =
            Layout::horizontal([Constraint::Length(24), Constraint::Min(1)]).areas(inner);

        let records: Vec<&PluginRecord> = app.host.registry().records().collect();
        let items: Vec<ListItem> = records
            .iter()
            .map(|record| ListItem::new(format!("{} {}", record.state.icon(), record.name)))
            .collect();
        let list = List::new(items)
            .block(th::block(theme, Some("Plugins"), false))
            .highlight_style(th::table_selected_style(theme));
        frame.render_stateful_widget(list, list_area, &mut app.package_manager.list_state);

        let selected = app.package_manager.list_state.selected().unwrap_or_default();
        let lines: Vec<Line> = match records.get(selected) {
            Some(record) => detail_rows(record)
                .into_iter()
                .map(|(label, value)| {
                    Line::from(vec![
                        Span::styled(format!("{label:<14}"), theme.text_secondary_style()),
                        Span::styled(value, theme.text_primary_style()),
                    ])
                })
                .collect(),
            None => vec![Line::from(Span::styled("No plugins discovered", theme.text_muted_style()))],
        };
        let details = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(th::block(theme, Some("Details"), false));
        frame.render_widget(details, details_area);
    }

    fn get_hint_spans(&self, app: &App) -> Vec<Span<'static>> {
        th::build_hint_spans(&*app.theme, &[("↑/↓", "select"), ("Esc", "close")])
    }
}

#[cfg(test)]
mod tests {
    use opsdeck_types::{FailureCause, PluginMetadata, PluginState};

    use super::*;

    #[test]
    fn details_cover_metadata_and_failure() {
        let mut record = PluginRecord::new("secrets", "/plugins/secrets/secrets.plugin");
        record.state = PluginState::Failed;
        record.metadata = Some(PluginMetadata {
            author: "Opsdeck".into(),
            tags: vec!["builtin".into(), "vault".into()],
            ..PluginMetadata::new("secrets", "0.1.0")
        });
        record.failure = Some(FailureCause::Fault("refresh panicked".into()));

        let rows = detail_rows(&record);
        let value = |label: &str| {
            rows.iter()
                .find(|(name, _)| *name == label)
                .map(|(_, value)| value.clone())
                .expect("row")
        };
        assert_eq!(value("Version"), "0.1.0");
        assert_eq!(value("State"), "Failed");
        assert_eq!(value("Tags"), "builtin, vault");
        assert_eq!(value("Architectures"), "any");
        assert_eq!(value("Description"), "-");
        assert_eq!(value("Failure"), "Fault: refresh panicked");
        assert_eq!(value("Started"), "-");
    }
}
