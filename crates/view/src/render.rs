//! ratatui rendering for [`CoreView`].

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Clear, Paragraph, Row, Table, Wrap},
};
use opsdeck_types::Severity;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core_view::{CoreView, Overlay, RowsKind};
use crate::theme::{Theme, helpers as th};

const COLUMN_SPACING: u16 = 1;
const MIN_COLUMN_WIDTH: u16 = 3;

impl CoreView {
    /// Draws the table, status line and any open overlay into `area`.
    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &dyn Theme, focused: bool) {
        let mut title = format!(" {} ", self.breadcrumb());
        if self.is_refreshing() {
            title.push_str("⟳ ");
        }
        let block = th::block(theme, Some(title.as_str()), focused);
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let status_height = u16::from(self.status().is_some());
        let [body, status_area] = Layout::vertical([Constraint::Min(1), Constraint::Length(status_height)]).areas(inner);

        if self.has_data() {
            self.render_table(frame, body, theme, focused);
        } else {
            self.render_sentinel(frame, body, theme);
        }

        if let Some(status) = self.status() {
            let line = Paragraph::new(status.text.as_str()).style(theme.severity_style(status.severity));
            frame.render_widget(line, status_area);
        }

        if let Some(overlay) = self.overlay() {
            render_overlay(frame, area, overlay, theme);
        }
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect, theme: &dyn Theme, focused: bool) {
        if area.width < 2 || area.height < 2 {
            return;
        }
        let [table_area, scrollbar_area] = Layout::horizontal([Constraint::Min(1), Constraint::Length(1)]).areas(area);
        let column_count = self.headers().len().max(self.rows().iter().map(Vec::len).max().unwrap_or(0));
        let widths = column_widths(table_area.width, self.headers(), self.rows(), column_count);

        let header = Row::new(
            (0..column_count)
                .map(|index| {
                    let text = self.headers().get(index).map(String::as_str).unwrap_or_default();
                    Cell::from(truncate_to_width(text, widths[index]))
                })
                .collect::<Vec<_>>(),
        )
        .style(th::table_header_row_style(theme));

        let rows: Vec<Row> = self
            .rows()
            .iter()
            .enumerate()
            .map(|(row_index, cells)| {
                Row::new(
                    (0..column_count)
                        .map(|index| {
                            let text = cells.get(index).map(String::as_str).unwrap_or_default();
                            Cell::from(truncate_to_width(text, widths[index]))
                        })
                        .collect::<Vec<_>>(),
                )
                .style(th::table_row_style(theme, row_index))
            })
            .collect();

        let table = Table::new(rows, widths.iter().map(|width| Constraint::Length(*width)).collect::<Vec<_>>())
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .row_highlight_style(if focused {
                th::table_selected_style(theme)
            } else {
                theme.selection_style()
            })
            .style(th::panel_style(theme));
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        let viewport = table_area.height.saturating_sub(1) as usize;
        th::render_vertical_scrollbar(
            frame,
            scrollbar_area,
            theme,
            self.rows().len(),
            self.table_state.offset(),
            viewport,
        );
    }

    fn render_sentinel(&self, frame: &mut Frame, area: Rect, theme: &dyn Theme) {
        let message = self
            .rows()
            .first()
            .and_then(|row| row.first())
            .map(String::as_str)
            .unwrap_or_default();
        let style = match self.rows_kind() {
            RowsKind::Error => theme.severity_style(Severity::Error),
            _ => theme.text_muted_style(),
        };
        let mut lines = Vec::new();
        if !self.headers().is_empty() {
            lines.push(Line::from(Span::styled(
                self.headers().join("  "),
                th::table_header_row_style(theme),
            )));
        }
        lines.push(Line::from(Span::styled(message.to_string(), style)));
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
    }
}

fn render_overlay(frame: &mut Frame, area: Rect, overlay: &Overlay, theme: &dyn Theme) {
    match overlay {
        Overlay::Confirm { title, message, .. } => {
            let popup = th::centered_rect(60, 40, area);
            frame.render_widget(Clear, popup);
            let block = th::block(theme, Some(title.as_str()), true).style(theme.modal_background_style());
            let inner = block.inner(popup);
            frame.render_widget(block, popup);
            let mut lines: Vec<Line> = textwrap::wrap(message, inner.width.max(1) as usize)
                .into_iter()
                .map(|line| Line::from(Span::styled(line.into_owned(), theme.text_primary_style())))
                .collect();
            lines.push(Line::default());
            lines.push(Line::from(th::build_hint_spans(theme, &[("y", "confirm"), ("n/Esc", "cancel")])));
            frame.render_widget(Paragraph::new(lines), inner);
        }
        Overlay::Details { title, lines, scroll } => {
            let popup = th::centered_rect(70, 70, area);
            frame.render_widget(Clear, popup);
            let block = th::block(theme, Some(title.as_str()), true).style(theme.modal_background_style());
            let inner = block.inner(popup);
            frame.render_widget(block, popup);
            let width = inner.width.max(1) as usize;
            let wrapped: Vec<Line> = lines
                .iter()
                .skip(*scroll)
                .flat_map(|line| {
                    if line.is_empty() {
                        vec![Line::default()]
                    } else {
                        textwrap::wrap(line, width)
                            .into_iter()
                            .map(|part| Line::from(Span::styled(part.into_owned(), theme.text_primary_style())))
                            .collect()
                    }
                })
                .collect();
            frame.render_widget(Paragraph::new(wrapped), inner);
        }
    }
}

/// Natural column widths, shrunk proportionally when they exceed `available`.
fn column_widths(available: u16, headers: &[String], rows: &[Vec<String>], column_count: usize) -> Vec<u16> {
    if column_count == 0 {
        return Vec::new();
    }
    let mut natural = vec![MIN_COLUMN_WIDTH; column_count];
    for (index, header) in headers.iter().enumerate() {
        natural[index] = natural[index].max(display_width(header));
    }
    for row in rows {
        for (index, cell) in row.iter().enumerate().take(column_count) {
            natural[index] = natural[index].max(display_width(cell));
        }
    }
    let spacing = COLUMN_SPACING.saturating_mul(column_count.saturating_sub(1) as u16);
    let room = available.saturating_sub(spacing).max(MIN_COLUMN_WIDTH);
    let total: u32 = natural.iter().map(|width| u32::from(*width)).sum();
    if total <= u32::from(room) {
        return natural;
    }
    natural
        .iter()
        .map(|width| {
            let scaled = u32::from(*width) * u32::from(room) / total.max(1);
            (scaled as u16).max(MIN_COLUMN_WIDTH.min(room))
        })
        .collect()
}

fn display_width(text: &str) -> u16 {
    u16::try_from(UnicodeWidthStr::width(text)).unwrap_or(u16::MAX)
}

/// Cuts `text` to at most `width` columns, marking the cut with `…`.
pub fn truncate_to_width(text: &str, width: u16) -> String {
    let width = width as usize;
    if UnicodeWidthStr::width(text) <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut result = String::new();
    let mut used = 0;
    for c in text.chars() {
        let char_width = c.width().unwrap_or(0);
        if used + char_width > width - 1 {
            break;
        }
        result.push(c);
        used += char_width;
    }
    result.push('…');
    result
}
