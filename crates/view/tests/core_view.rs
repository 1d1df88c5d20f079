use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use opsdeck_view::theme::DraculaTheme;
use opsdeck_view::{
    ConnectionGate, CoreView, RenderSurface, RootView, Rows, RowsKind, UiReceiver, UiUpdate, ViewError,
    ViewIdAllocator, ui_queue,
};
use ratatui::{Terminal, backend::TestBackend};

fn surface() -> (RenderSurface, UiReceiver) {
    let (tx, rx) = ui_queue();
    (RenderSurface::new("redis", tx, ViewIdAllocator::default()), rx)
}

/// Waits for the next queued update and applies it to `view`.
async fn apply_next(view: &mut CoreView, rx: &mut UiReceiver) {
    match rx.recv().await {
        Some(UiUpdate::Apply { target, op }) => {
            assert_eq!(target, view.id());
            op(view);
        }
        other => panic!("unexpected update: {other:?}"),
    }
}

fn counting_refresh(view: &mut CoreView, calls: Arc<AtomicUsize>) {
    view.set_refresh(move || {
        let calls = calls.clone();
        async move {
            let count = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(vec![vec![format!("cycle-{count}")]])
        }
        .boxed()
    });
}

async fn explode() -> Result<Rows, ViewError> {
    panic!("driver exploded")
}

#[tokio::test]
async fn failed_refresh_shows_a_single_error_row() {
    let (surface, mut rx) = surface();
    let mut view = surface.create_view("redis");
    view.set_refresh(|| async { Err(ViewError::connect_failed("connection refused")) }.boxed());

    assert!(view.refresh());
    assert!(view.is_refreshing());
    apply_next(&mut view, &mut rx).await;

    assert_eq!(view.rows(), &[vec!["Error: connection refused".to_string()]]);
    assert_eq!(view.rows_kind(), RowsKind::Error);
    assert_eq!(view.selected_row(), None);
    assert!(!view.is_refreshing());
}

#[tokio::test]
async fn successful_refresh_replaces_rows() {
    let (surface, mut rx) = surface();
    let mut view = surface.create_view("redis");
    view.set_headers(["Name", "Host"]);
    view.set_refresh(|| async { Ok(vec![vec!["cache".to_string(), "localhost".to_string()]]) }.boxed());

    view.refresh();
    apply_next(&mut view, &mut rx).await;

    assert!(view.has_data());
    assert_eq!(view.selected_cells(), Some(&["cache".to_string(), "localhost".to_string()][..]));
}

#[tokio::test(start_paused = true)]
async fn slow_refresh_times_out() {
    let (surface, mut rx) = surface();
    let mut view = surface.create_view("redis");
    view.set_refresh_timeout(Duration::from_secs(2));
    view.set_refresh(|| {
        async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
        .boxed()
    });

    view.refresh();
    apply_next(&mut view, &mut rx).await;

    assert_eq!(view.rows(), &[vec!["Error: timed out after 2s".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn auto_refresh_waits_for_connection() {
    let (surface, mut rx) = surface();
    let mut view = surface.create_view("redis");
    let calls = Arc::new(AtomicUsize::new(0));
    counting_refresh(&mut view, calls.clone());

    let gate = ConnectionGate::new(false);
    view.enable_auto_refresh(Duration::from_secs(30), gate.clone());
    assert_eq!(view.auto_refresh_interval(), Some(Duration::from_secs(30)));
    assert!(view.has_active_timers());

    let idle = tokio::time::timeout(Duration::from_secs(95), rx.recv()).await;
    assert!(idle.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    gate.set_connected(true);
    apply_next(&mut view, &mut rx).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(view.rows(), &[vec!["cycle-1".to_string()]]);

    apply_next(&mut view, &mut rx).await;
    assert_eq!(view.rows(), &[vec!["cycle-2".to_string()]]);
}

#[tokio::test(start_paused = true)]
async fn stop_halts_auto_refresh() {
    let (surface, mut rx) = surface();
    let mut view = surface.create_view("redis");
    let calls = Arc::new(AtomicUsize::new(0));
    counting_refresh(&mut view, calls.clone());
    view.enable_auto_refresh(Duration::from_secs(5), ConnectionGate::always_open());

    apply_next(&mut view, &mut rx).await;
    view.stop();
    assert!(!view.has_active_timers());

    let after_stop = tokio::time::timeout(Duration::from_secs(60), rx.recv()).await;
    assert!(after_stop.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn panicking_refresh_reports_a_fault() {
    let (surface, mut rx) = surface();
    let mut view = surface.create_view("redis");
    view.set_refresh(|| explode().boxed());

    view.refresh();
    match rx.recv().await {
        Some(UiUpdate::Fault { plugin, message }) => {
            assert_eq!(plugin, "redis");
            assert!(message.contains("driver exploded"));
        }
        other => panic!("unexpected update: {other:?}"),
    }
}

#[tokio::test]
async fn root_view_routes_updates_to_the_matching_pane() {
    let (surface, _rx) = surface();
    let left = surface.create_view("services");
    let right = surface.create_view("details");
    let right_id = right.id();
    let mut root = RootView::new(left).with_pane(right);

    assert!(root.apply(right_id, Box::new(|view| view.set_rows(vec![vec!["x".into()]]))));
    assert!(root.panes()[1].has_data());
    assert!(!root.panes()[0].has_data());

    assert!(root.focus_next());
    assert_eq!(root.active_index(), 1);
    assert!(!root.focus_next());
    assert_eq!(root.active_index(), 0);
}

#[test]
fn render_shows_breadcrumb_and_cells() {
    let (tx, _rx) = ui_queue();
    let surface = RenderSurface::new("redis", tx, ViewIdAllocator::default());
    let mut view = surface.create_view("Services");
    view.set_headers(["Service", "Entries"]);
    view.set_rows(vec![vec!["redis".into(), "3".into()], vec!["postgres".into(), "1".into()]]);
    view.push_view("redis");

    let theme = DraculaTheme::new();
    let mut terminal = Terminal::new(TestBackend::new(60, 10)).unwrap();
    terminal
        .draw(|frame| view.render(frame, frame.area(), &theme, true))
        .unwrap();

    let screen: String = terminal
        .backend()
        .buffer()
        .content()
        .iter()
        .map(|cell| cell.symbol())
        .collect();
    assert!(screen.contains("Services › redis"));
    assert!(screen.contains("postgres"));
    assert!(screen.contains("Entries"));
}
