use std::collections::VecDeque;

use opsdeck_types::LogLine;
use opsdeck_util::redact_sensitive;
use rat_focus::{FocusBuilder, FocusFlag, HasFocus};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;

/// Bounded ring of log lines shown in the log pane.
#[derive(Debug)]
pub struct LogsState {
    lines: VecDeque<LogLine>,
    capacity: usize,
    /// Whether the pane is shown; toggled with Ctrl+L.
    pub is_visible: bool,
    pub list_state: ListState,
    /// Focus flag for rat-focus integration
    pub focus: FocusFlag,
}

impl LogsState {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            is_visible: true,
            list_state: ListState::default(),
            focus: FocusFlag::named("opsdeck.logs"),
        }
    }

    /// Appends `line` with secret-looking values redacted, evicting the oldest line when full.
    pub fn push(&mut self, mut line: LogLine) {
        line.message = redact_sensitive(&line.message);
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            if let Some(selected) = self.list_state.selected() {
                self.list_state.select(Some(selected.saturating_sub(1)));
            }
        }
        self.lines.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &LogLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn toggle_visible(&mut self) {
        self.is_visible = !self.is_visible;
    }

    /// Keeps the newest line in view while the pane is not being browsed.
    pub fn follow_tail(&mut self) {
        if !self.lines.is_empty() {
            self.list_state.select(Some(self.lines.len() - 1));
        }
    }
}

impl HasFocus for LogsState {
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

#[cfg(test)]
mod tests {
    use opsdeck_types::Severity;

    use super::*;

    #[test]
    fn ring_evicts_oldest_lines() {
        let mut logs = LogsState::new(3);
        for index in 0..5 {
            logs.push(LogLine::new(Severity::Info, "host", format!("line {index}")));
        }
        let messages: Vec<&str> = logs.lines().map(|line| line.message.as_str()).collect();
        assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn pushed_lines_are_redacted() {
        let mut logs = LogsState::new(10);
        logs.push(LogLine::new(
            Severity::Error,
            "secrets",
            "dial postgres://admin:s3cret@db:5432 failed",
        ));
        let line = logs.lines().next().expect("line");
        assert_eq!(line.message, "dial postgres://admin:<redacted>@db:5432 failed");
    }
}
