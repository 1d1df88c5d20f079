use crate::keys::KeyChord;

/// Semantic events a view forwards to its plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewAction {
    /// A key with no direct handler.
    KeyPress(KeyChord),
    /// Enter on the selected row.
    Enter { row: usize },
    RowSelected(usize),
    /// The back gesture popped `from` off the view stack.
    NavigateBack { from: String },
    /// A confirmation overlay was accepted.
    Confirmed { tag: String },
    /// A confirmation overlay was dismissed.
    Cancelled { tag: String },
}

impl ViewAction {
    pub fn name(&self) -> &'static str {
        match self {
            ViewAction::KeyPress(_) => "keypress",
            ViewAction::Enter { .. } => "enter",
            ViewAction::RowSelected(_) => "row_selected",
            ViewAction::NavigateBack { .. } => "navigate_back",
            ViewAction::Confirmed { .. } => "confirmed",
            ViewAction::Cancelled { .. } => "cancelled",
        }
    }
}
