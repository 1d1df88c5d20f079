//! The reusable interactive table engine every plugin screen is built from.
//!
//! A [`CoreView`] owns a table model (headers, rows, selection), a key
//! binding table, a typed action dispatcher, a navigation stack of view
//! names, modal overlays and a background refresh scheduler. It never knows
//! what a view name means: the plugin reconfigures headers, bindings and the
//! refresh callback when it pushes or pops a view.
//!
//! `CoreView` is not `Send`. It lives on the UI thread; background refreshes
//! post their results back through the [`UiSender`] queue.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind};
use futures_util::future::BoxFuture;
use indexmap::IndexMap;
use opsdeck_types::Severity;
use ratatui::widgets::TableState;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::action::ViewAction;
use crate::error::ViewError;
use crate::keys::KeyChord;
use crate::queue::{UiSender, ViewId};
use crate::task::{ConnectionGate, TaskSpawner};

pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);
pub const LOADING_MESSAGE: &str = "Loading…";
pub const NO_DATA_MESSAGE: &str = "No data found";
const PAGE_SIZE: usize = 10;

/// Rows produced by a refresh.
pub type Rows = Vec<Vec<String>>;

/// Produces fresh rows off the UI thread.
pub type RefreshCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<Rows, ViewError>> + Send + Sync>;

/// Receives semantic events on the UI thread.
pub type ActionHandler = Rc<dyn Fn(&mut CoreView, ViewAction)>;

/// Runs immediately when its chord is pressed.
pub type KeyHandler = Rc<dyn Fn(&mut CoreView)>;

#[derive(Clone)]
pub struct KeyBinding {
    pub label: String,
    /// `None` routes the key to the action handler as [`ViewAction::KeyPress`].
    pub handler: Option<KeyHandler>,
}

impl std::fmt::Debug for KeyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBinding")
            .field("label", &self.label)
            .field("direct", &self.handler.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    Confirm { title: String, message: String, tag: String },
    Details { title: String, lines: Vec<String>, scroll: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub severity: Severity,
    pub text: String,
}

/// What the table currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowsKind {
    Loading,
    Data,
    Empty,
    Error,
}

/// State shared with background refresh tasks.
struct RefreshShared {
    callback: Mutex<Option<RefreshCallback>>,
    /// Bumped whenever the screen changes so results for an earlier screen are ignored.
    epoch: AtomicU64,
}

impl RefreshShared {
    fn callback(&self) -> Option<RefreshCallback> {
        self.callback.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_callback(&self, callback: Option<RefreshCallback>) {
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = callback;
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }
}

struct AutoRefresh {
    interval: Duration,
    token: CancellationToken,
}

pub struct CoreView {
    id: ViewId,
    spawner: TaskSpawner,
    headers: Vec<String>,
    rows: Rows,
    rows_kind: RowsKind,
    selected: Option<usize>,
    pub(crate) table_state: TableState,
    bindings: IndexMap<KeyChord, KeyBinding>,
    action_handler: Option<ActionHandler>,
    refresh: Arc<RefreshShared>,
    refresh_timeout: Duration,
    /// Screen epoch of the latest dispatched refresh still in flight.
    refreshing: Option<u64>,
    view_stack: Vec<String>,
    overlay: Option<Overlay>,
    status: Option<StatusLine>,
    auto_refresh: Option<AutoRefresh>,
    tasks: CancellationToken,
}

impl std::fmt::Debug for CoreView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreView")
            .field("id", &self.id)
            .field("view_stack", &self.view_stack)
            .field("headers", &self.headers)
            .field("rows", &self.rows.len())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl CoreView {
    /// A view whose stack starts at `root`, showing `Loading…` until the first refresh.
    pub fn new(id: ViewId, spawner: TaskSpawner, root: impl Into<String>) -> Self {
        Self {
            id,
            spawner,
            headers: Vec::new(),
            rows: vec![vec![LOADING_MESSAGE.to_string()]],
            rows_kind: RowsKind::Loading,
            selected: None,
            table_state: TableState::default(),
            bindings: IndexMap::new(),
            action_handler: None,
            refresh: Arc::new(RefreshShared {
                callback: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            refreshing: None,
            view_stack: vec![root.into()],
            overlay: None,
            status: None,
            auto_refresh: None,
            tasks: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn owner(&self) -> &str {
        self.spawner.owner()
    }

    pub fn ui(&self) -> &UiSender {
        self.spawner.ui()
    }

    pub fn spawner(&self) -> &TaskSpawner {
        &self.spawner
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Replaces the column headers; results of refreshes started before the change are dropped.
    pub fn set_headers<I, S>(&mut self, headers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.headers = headers.into_iter().map(Into::into).collect();
        self.bump_epoch();
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn rows_kind(&self) -> RowsKind {
        self.rows_kind
    }

    /// Whether the table holds real data (not a loading/empty/error sentinel).
    pub fn has_data(&self) -> bool {
        self.rows_kind == RowsKind::Data
    }

    /// Replaces the rows and clamps the selection. An empty set becomes the
    /// `No data found` sentinel.
    pub fn set_rows(&mut self, rows: Rows) {
        if rows.is_empty() {
            self.set_sentinel(RowsKind::Empty, NO_DATA_MESSAGE.to_string());
            return;
        }
        self.rows = rows;
        self.rows_kind = RowsKind::Data;
        self.selected = match self.selected {
            Some(index) => Some(index.min(self.rows.len() - 1)),
            None => Some(0),
        };
        self.sync_table_state();
    }

    /// Replaces the table with a single error row.
    pub fn set_error(&mut self, error: &ViewError) {
        self.set_sentinel(RowsKind::Error, format!("Error: {error}"));
    }

    /// Shows `Loading…` until the next refresh completes.
    pub fn show_loading(&mut self) {
        self.set_sentinel(RowsKind::Loading, LOADING_MESSAGE.to_string());
    }

    fn set_sentinel(&mut self, kind: RowsKind, message: String) {
        let mut row = vec![String::new(); self.headers.len().max(1)];
        row[0] = message;
        self.rows = vec![row];
        self.rows_kind = kind;
        self.selected = None;
        self.sync_table_state();
    }

    /// Index of the selected data row; `None` for sentinels or stale selections.
    pub fn selected_row(&self) -> Option<usize> {
        self.selected.filter(|index| self.has_data() && *index < self.rows.len())
    }

    pub fn selected_cells(&self) -> Option<&[String]> {
        self.selected_row().map(|index| self.rows[index].as_slice())
    }

    /// Selects `index` (clamped) and fires [`ViewAction::RowSelected`] when it changed.
    pub fn select(&mut self, index: usize) {
        if !self.has_data() {
            return;
        }
        let index = index.min(self.rows.len() - 1);
        if self.selected == Some(index) {
            return;
        }
        self.selected = Some(index);
        self.sync_table_state();
        self.dispatch(ViewAction::RowSelected(index));
    }

    fn move_selection(&mut self, delta: isize) {
        if !self.has_data() {
            return;
        }
        let current = self.selected_row().unwrap_or(0) as isize;
        let last = self.rows.len() as isize - 1;
        self.select((current + delta).clamp(0, last) as usize);
    }

    fn sync_table_state(&mut self) {
        self.table_state.select(self.selected);
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }

    pub fn set_status(&mut self, severity: Severity, text: impl Into<String>) {
        self.status = Some(StatusLine {
            severity,
            text: text.into(),
        });
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    /// Binds `chord`; a `None` handler routes the key to the action handler.
    pub fn bind(&mut self, chord: KeyChord, label: impl Into<String>, handler: Option<KeyHandler>) {
        self.bindings.insert(
            chord,
            KeyBinding {
                label: label.into(),
                handler,
            },
        );
    }

    /// Convenience for a direct handler.
    pub fn bind_fn<F>(&mut self, chord: KeyChord, label: impl Into<String>, handler: F)
    where
        F: Fn(&mut CoreView) + 'static,
    {
        self.bind(chord, label, Some(Rc::new(handler)));
    }

    pub fn unbind(&mut self, chord: &KeyChord) -> Option<KeyBinding> {
        self.bindings.shift_remove(chord)
    }

    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&KeyChord, &KeyBinding)> {
        self.bindings.iter()
    }

    pub fn set_action_handler<F>(&mut self, handler: F)
    where
        F: Fn(&mut CoreView, ViewAction) + 'static,
    {
        self.action_handler = Some(Rc::new(handler));
    }

    /// Forwards `action` to the plugin; returns whether a handler received it.
    pub fn dispatch(&mut self, action: ViewAction) -> bool {
        let Some(handler) = self.action_handler.clone() else {
            trace!(view = %self.id, action = action.name(), "No action handler");
            return false;
        };
        handler(self, action);
        true
    }

    /// `(key, label)` pairs for the hints bar.
    pub fn hints(&self) -> Vec<(String, String)> {
        if let Some(overlay) = &self.overlay {
            return match overlay {
                Overlay::Confirm { .. } => vec![("y".into(), "confirm".into()), ("n/Esc".into(), "cancel".into())],
                Overlay::Details { .. } => vec![("↑/↓".into(), "scroll".into()), ("Esc".into(), "close".into())],
            };
        }
        let mut hints: Vec<(String, String)> = self
            .bindings
            .iter()
            .map(|(chord, binding)| (chord.to_string(), binding.label.clone()))
            .collect();
        hints.push(("r".into(), "refresh".into()));
        if self.view_stack.len() > 1 {
            hints.push(("Esc".into(), "back".into()));
        }
        hints
    }

    pub fn overlay(&self) -> Option<&Overlay> {
        self.overlay.as_ref()
    }

    /// Asks before a destructive action; the answer arrives as
    /// [`ViewAction::Confirmed`] or [`ViewAction::Cancelled`] with `tag`.
    pub fn confirm(&mut self, title: impl Into<String>, message: impl Into<String>, tag: impl Into<String>) {
        self.overlay = Some(Overlay::Confirm {
            title: title.into(),
            message: message.into(),
            tag: tag.into(),
        });
    }

    pub fn show_details(&mut self, title: impl Into<String>, lines: Vec<String>) {
        self.overlay = Some(Overlay::Details {
            title: title.into(),
            lines,
            scroll: 0,
        });
    }

    pub fn close_overlay(&mut self) {
        self.overlay = None;
    }

    fn handle_overlay_key(&mut self, chord: KeyChord) {
        let Some(overlay) = self.overlay.as_mut() else {
            return;
        };
        match overlay {
            Overlay::Confirm { tag, .. } => {
                let tag = tag.clone();
                match chord.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                        self.overlay = None;
                        self.dispatch(ViewAction::Confirmed { tag });
                    }
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                        self.overlay = None;
                        self.set_status(Severity::Info, "Cancelled");
                        self.dispatch(ViewAction::Cancelled { tag });
                    }
                    _ => {}
                }
            }
            Overlay::Details { lines, scroll, .. } => match chord.code {
                KeyCode::Up | KeyCode::Char('k') => *scroll = scroll.saturating_sub(1),
                KeyCode::Down | KeyCode::Char('j') => *scroll = (*scroll + 1).min(lines.len().saturating_sub(1)),
                KeyCode::PageUp => *scroll = scroll.saturating_sub(PAGE_SIZE),
                KeyCode::PageDown => *scroll = (*scroll + PAGE_SIZE).min(lines.len().saturating_sub(1)),
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => self.overlay = None,
                _ => {}
            },
        }
    }

    pub fn view_stack(&self) -> &[String] {
        &self.view_stack
    }

    pub fn current_view(&self) -> &str {
        self.view_stack.last().map(String::as_str).unwrap_or_default()
    }

    /// `root › child › grandchild`
    pub fn breadcrumb(&self) -> String {
        self.view_stack.join(" › ")
    }

    pub fn push_view(&mut self, name: impl Into<String>) {
        let name = name.into();
        debug!(view = %self.id, screen = %name, "Push view");
        self.view_stack.push(name);
        self.selected = None;
        self.bump_epoch();
    }

    /// The back gesture: pops the current view and fires
    /// [`ViewAction::NavigateBack`]. The root is never popped.
    pub fn navigate_back(&mut self) -> bool {
        if self.view_stack.len() <= 1 {
            return false;
        }
        let Some(from) = self.view_stack.pop() else {
            return false;
        };
        debug!(view = %self.id, from = %from, "Navigate back");
        self.selected = None;
        self.bump_epoch();
        self.dispatch(ViewAction::NavigateBack { from });
        true
    }

    fn bump_epoch(&mut self) {
        self.refresh.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Routes a key: overlay first, then bindings, then built-in navigation,
    /// then the action handler. Returns whether the key was consumed.
    pub fn handle_key(&mut self, event: KeyEvent) -> bool {
        if event.kind == KeyEventKind::Release {
            return false;
        }
        let chord = KeyChord::from(event);
        if self.overlay.is_some() {
            self.handle_overlay_key(chord);
            return true;
        }

        if let Some(binding) = self.bindings.get(&chord) {
            match binding.handler.clone() {
                Some(handler) => handler(self),
                None => {
                    self.dispatch(ViewAction::KeyPress(chord));
                }
            }
            return true;
        }

        if chord.modifiers.is_empty() {
            match chord.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.move_selection(-1);
                    return true;
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.move_selection(1);
                    return true;
                }
                KeyCode::PageUp => {
                    self.move_selection(-(PAGE_SIZE as isize));
                    return true;
                }
                KeyCode::PageDown => {
                    self.move_selection(PAGE_SIZE as isize);
                    return true;
                }
                KeyCode::Home => {
                    self.select(0);
                    return true;
                }
                KeyCode::End => {
                    self.select(self.rows.len().saturating_sub(1));
                    return true;
                }
                KeyCode::Enter => {
                    if let Some(row) = self.selected_row() {
                        self.dispatch(ViewAction::Enter { row });
                    }
                    return true;
                }
                KeyCode::Esc | KeyCode::Backspace => return self.navigate_back(),
                KeyCode::Char('r') => {
                    self.refresh();
                    return true;
                }
                _ => {}
            }
        }

        self.dispatch(ViewAction::KeyPress(chord))
    }

    /// Installs the callback used by manual refresh and auto-refresh.
    pub fn set_refresh<F>(&mut self, callback: F)
    where
        F: Fn() -> BoxFuture<'static, Result<Rows, ViewError>> + Send + Sync + 'static,
    {
        self.refresh.set_callback(Some(Arc::new(callback)));
    }

    pub fn clear_refresh(&mut self) {
        self.refresh.set_callback(None);
    }

    pub fn set_refresh_timeout(&mut self, timeout: Duration) {
        self.refresh_timeout = timeout;
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.is_some()
    }

    /// Runs the refresh callback on a background task; the result comes back
    /// through the UI queue. Returns `false` when nothing was dispatched.
    pub fn refresh(&mut self) -> bool {
        if self.refresh.callback().is_none() {
            return false;
        }
        let shared = self.refresh.clone();
        let ui = self.spawner.ui().clone();
        let target = self.id;
        let epoch = shared.epoch();
        let timeout = self.refresh_timeout;
        let token = self.tasks.child_token();
        let started = self.spawner.spawn("refresh", async move {
            let Some(outcome) = run_refresh(&shared, timeout, &token).await else {
                return;
            };
            let _ = ui.apply(target, move |view| view.finish_refresh(epoch, outcome)).await;
        });
        if started {
            self.refreshing = Some(epoch);
        }
        started
    }

    /// Applies a refresh outcome on the UI thread. Stale screens are ignored;
    /// otherwise results apply in completion order.
    pub fn finish_refresh(&mut self, epoch: u64, outcome: Result<Rows, ViewError>) {
        if self.refreshing == Some(epoch) {
            self.refreshing = None;
        }
        if epoch != self.refresh.epoch() {
            trace!(view = %self.id, "Dropping refresh result for a previous screen");
            return;
        }
        match outcome {
            Ok(rows) => self.set_rows(rows),
            Err(error) => {
                debug!(view = %self.id, %error, "Refresh failed");
                self.set_error(&error);
            }
        }
    }

    /// Re-runs the refresh every `interval` while `gate` reports connected.
    /// Each cycle re-arms only after the previous one completed.
    pub fn enable_auto_refresh(&mut self, interval: Duration, gate: ConnectionGate) {
        self.disable_auto_refresh();
        let token = self.tasks.child_token();
        let shared = self.refresh.clone();
        let ui = self.spawner.ui().clone();
        let target = self.id;
        let timeout = self.refresh_timeout;
        let task_token = token.clone();
        let started = self.spawner.spawn("auto-refresh", async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if !gate.is_connected() {
                    trace!(view = %target, "Auto-refresh suspended; not connected");
                    continue;
                }
                let epoch = shared.epoch();
                let Some(outcome) = run_refresh(&shared, timeout, &task_token).await else {
                    if task_token.is_cancelled() {
                        break;
                    }
                    continue;
                };
                if ui.apply(target, move |view| view.finish_refresh(epoch, outcome)).await.is_err() {
                    break;
                }
            }
            trace!(view = %target, "Auto-refresh stopped");
        });
        if started {
            self.auto_refresh = Some(AutoRefresh { interval, token });
        }
    }

    pub fn disable_auto_refresh(&mut self) {
        if let Some(auto_refresh) = self.auto_refresh.take() {
            auto_refresh.token.cancel();
        }
    }

    pub fn auto_refresh_interval(&self) -> Option<Duration> {
        self.auto_refresh.as_ref().map(|auto_refresh| auto_refresh.interval)
    }

    /// Whether any timer or in-flight refresh owned by this view may still run.
    pub fn has_active_timers(&self) -> bool {
        self.auto_refresh
            .as_ref()
            .is_some_and(|auto_refresh| !auto_refresh.token.is_cancelled())
    }

    /// Token cancelled when the view stops; background work started by the
    /// plugin for this view can select on it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.tasks.clone()
    }

    /// Halts every timer and in-flight refresh, then drops bindings,
    /// handlers and overlays.
    pub fn stop(&mut self) {
        self.tasks.cancel();
        self.auto_refresh = None;
        self.refreshing = None;
        self.bindings.clear();
        self.action_handler = None;
        self.refresh.set_callback(None);
        self.overlay = None;
        self.tasks = CancellationToken::new();
        debug!(view = %self.id, "View stopped");
    }
}

/// `None` when cancelled or when no callback is installed.
async fn run_refresh(shared: &RefreshShared, timeout: Duration, token: &CancellationToken) -> Option<Result<Rows, ViewError>> {
    let callback = shared.callback()?;
    tokio::select! {
        _ = token.cancelled() => None,
        result = tokio::time::timeout(timeout, callback()) => Some(match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ViewError::Timeout(timeout)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::queue::{ViewIdAllocator, ui_queue};

    fn view() -> CoreView {
        let (tx, _rx) = ui_queue();
        CoreView::new(ViewIdAllocator::default().next(), TaskSpawner::new(tx, "test"), "root")
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn rows(count: usize) -> Rows {
        (0..count).map(|index| vec![format!("row-{index}"), "x".into()]).collect()
    }

    fn record_actions(view: &mut CoreView) -> Rc<RefCell<Vec<ViewAction>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        view.set_action_handler(move |_, action| sink.borrow_mut().push(action));
        seen
    }

    #[test]
    fn starts_with_loading_sentinel() {
        let view = view();
        assert_eq!(view.rows(), &[vec![LOADING_MESSAGE.to_string()]]);
        assert_eq!(view.rows_kind(), RowsKind::Loading);
        assert_eq!(view.selected_row(), None);
    }

    #[test]
    fn error_sentinel_is_padded_to_header_width() {
        let mut view = view();
        view.set_headers(["Name", "Host", "Port"]);
        view.set_error(&ViewError::connect_failed("connection refused"));
        assert_eq!(view.rows(), &[vec!["Error: connection refused".to_string(), String::new(), String::new()]]);
        assert_eq!(view.selected_row(), None);
    }

    #[test]
    fn shrinking_rows_clamps_selection() {
        let mut view = view();
        view.set_rows(rows(10));
        view.select(8);
        view.set_rows(rows(3));
        assert_eq!(view.selected_row(), Some(2));
        view.set_rows(Vec::new());
        assert_eq!(view.rows()[0][0], NO_DATA_MESSAGE);
        assert_eq!(view.selected_row(), None);
        assert_eq!(view.selected_cells(), None);
    }

    #[test]
    fn navigation_keeps_root() {
        let mut view = view();
        let seen = record_actions(&mut view);
        view.push_view("environments");
        view.push_view("entries");
        assert_eq!(view.breadcrumb(), "root › environments › entries");

        assert!(view.handle_key(key(KeyCode::Esc)));
        assert!(view.handle_key(key(KeyCode::Backspace)));
        assert!(!view.handle_key(key(KeyCode::Esc)));
        assert_eq!(view.view_stack(), &["root".to_string()]);
        assert_eq!(
            *seen.borrow(),
            vec![
                ViewAction::NavigateBack { from: "entries".into() },
                ViewAction::NavigateBack {
                    from: "environments".into()
                },
            ]
        );
    }

    #[test]
    fn direct_handlers_run_and_unhandled_bindings_are_forwarded() {
        let mut view = view();
        let seen = record_actions(&mut view);
        view.bind_fn(KeyChord::char('x'), "mark", |view| view.set_status(Severity::Success, "marked"));
        view.bind(KeyChord::char('d'), "delete", None);

        assert!(view.handle_key(key(KeyCode::Char('x'))));
        assert_eq!(view.status().map(|status| status.text.as_str()), Some("marked"));

        assert!(view.handle_key(key(KeyCode::Char('d'))));
        assert!(view.handle_key(key(KeyCode::Char('z'))));
        assert_eq!(
            *seen.borrow(),
            vec![ViewAction::KeyPress(KeyChord::char('d')), ViewAction::KeyPress(KeyChord::char('z'))]
        );
    }

    #[test]
    fn movement_fires_row_selected_and_enter_reports_row() {
        let mut view = view();
        view.set_rows(rows(5));
        let seen = record_actions(&mut view);
        view.handle_key(key(KeyCode::Down));
        view.handle_key(key(KeyCode::Char('j')));
        view.handle_key(key(KeyCode::End));
        view.handle_key(key(KeyCode::Enter));
        view.handle_key(key(KeyCode::Home));
        assert_eq!(
            *seen.borrow(),
            vec![
                ViewAction::RowSelected(1),
                ViewAction::RowSelected(2),
                ViewAction::RowSelected(4),
                ViewAction::Enter { row: 4 },
                ViewAction::RowSelected(0),
            ]
        );
    }

    #[test]
    fn enter_on_sentinel_does_nothing() {
        let mut view = view();
        let seen = record_actions(&mut view);
        view.set_error(&ViewError::failed("boom"));
        view.handle_key(key(KeyCode::Enter));
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn confirmation_requires_explicit_yes() {
        let mut view = view();
        let seen = record_actions(&mut view);
        view.confirm("Delete", "Delete redis/dev/a?", "delete:redis/dev/a");
        assert!(view.handle_key(key(KeyCode::Char('d'))));
        assert!(view.overlay().is_some());
        view.handle_key(key(KeyCode::Char('n')));
        assert!(view.overlay().is_none());
        assert_eq!(view.status().map(|status| status.text.as_str()), Some("Cancelled"));

        view.confirm("Delete", "Delete redis/dev/a?", "delete:redis/dev/a");
        view.handle_key(key(KeyCode::Char('y')));
        assert_eq!(
            *seen.borrow(),
            vec![
                ViewAction::Cancelled {
                    tag: "delete:redis/dev/a".into()
                },
                ViewAction::Confirmed {
                    tag: "delete:redis/dev/a".into()
                },
            ]
        );
    }

    #[test]
    fn stale_screen_results_are_ignored() {
        let mut view = view();
        let epoch = view.refresh.epoch();
        view.push_view("details");
        view.finish_refresh(epoch, Ok(rows(2)));
        assert_eq!(view.rows_kind(), RowsKind::Loading);
    }

    #[test]
    fn stale_result_keeps_the_current_refresh_indicator() {
        let mut view = view();
        let previous = view.refresh.epoch();
        view.push_view("details");
        let current = view.refresh.epoch();
        view.refreshing = Some(current);

        view.finish_refresh(previous, Ok(rows(2)));
        assert!(view.is_refreshing());

        view.finish_refresh(current, Ok(rows(2)));
        assert!(!view.is_refreshing());
        assert!(view.has_data());
    }

    #[test]
    fn stop_clears_bindings_and_handlers() {
        let mut view = view();
        view.bind(KeyChord::char('d'), "delete", None);
        view.set_action_handler(|_, _| {});
        let token = view.cancellation_token();
        view.stop();
        assert!(token.is_cancelled());
        assert_eq!(view.bindings().count(), 0);
        assert!(!view.dispatch(ViewAction::RowSelected(0)));
        assert!(!view.refresh());
    }
}
