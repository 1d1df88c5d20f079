//! Runtime: the single-threaded UI loop.
//!
//! - Owns the terminal lifecycle (raw mode, alternate screen).
//! - A dedicated OS thread blocks on `crossterm::event::read()` and forwards
//!   events over a channel.
//! - Updates posted by plugin background tasks arrive on the UI queue and are
//!   applied here, so views are only ever mutated on this thread.
//! - Ticks are fast while a pane is refreshing (throbber) and slow when idle.
//! - Renders only when something visible changed.

use std::io::Stdout;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use opsdeck_types::{Effect, Msg};
use opsdeck_view::UiReceiver;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::{
    signal,
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::app::App;
use crate::ui::components::Component;
use crate::ui::main_component::MainView;

const INPUT_CHANNEL_CAPACITY: usize = 256;
const FAST_TICK: Duration = Duration::from_millis(120);
const IDLE_TICK: Duration = Duration::from_secs(5);

type Term = Terminal<CrosstermBackend<Stdout>>;

/// Forwards terminal events from a blocking reader thread.
fn spawn_input_thread() -> mpsc::Receiver<Event> {
    let (sender, receiver) = mpsc::channel(INPUT_CHANNEL_CAPACITY);
    let spawned = thread::Builder::new().name("opsdeck-input".into()).spawn(move || {
        loop {
            match event::read() {
                Ok(event) => {
                    if sender.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    warn!(%error, "Failed to read terminal event");
                    break;
                }
            }
        }
    });
    if let Err(error) = spawned {
        warn!(%error, "Failed to spawn input thread");
    }
    receiver
}

fn setup_terminal() -> Result<Term> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn cleanup_terminal(terminal: &mut Term) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn render(terminal: &mut Term, app: &mut App, main_view: &mut MainView) -> Result<()> {
    if app.focus.focused().is_none() {
        app.rebuild_focus();
    }
    terminal.draw(|frame| main_view.render(frame, frame.area(), app))?;
    Ok(())
}

fn handle_input_event(app: &mut App, main_view: &mut MainView, input: Event) -> Vec<Effect> {
    match input {
        Event::Key(key) if key.kind == KeyEventKind::Press => main_view.handle_key_events(app, key),
        Event::Resize(width, height) => main_view.handle_message(app, &Msg::Resize(width, height)),
        _ => Vec::new(),
    }
}

/// Sets up the terminal, runs the loop until quit, and restores the
/// terminal even when the loop fails.
pub async fn run_app(mut app: App, mut ui_rx: UiReceiver) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let outcome = event_loop(&mut terminal, &mut app, &mut ui_rx).await;
    app.shutdown();
    let cleanup = cleanup_terminal(&mut terminal);
    outcome.and(cleanup)
}

async fn event_loop(terminal: &mut Term, app: &mut App, ui_rx: &mut UiReceiver) -> Result<()> {
    let mut input = spawn_input_thread();
    let mut main_view = MainView::new();

    let mut current_interval = IDLE_TICK;
    let mut ticker = time::interval(current_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    render(terminal, app, &mut main_view)?;

    loop {
        let animating = app.is_refreshing();
        let target_interval = if animating { FAST_TICK } else { IDLE_TICK };
        if target_interval != current_interval {
            current_interval = target_interval;
            ticker = time::interval(current_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        let mut effects = Vec::new();
        let mut needs_render = false;
        tokio::select! {
            maybe_event = input.recv() => {
                let Some(event) = maybe_event else {
                    info!("Input closed; shutting down");
                    break;
                };
                effects.extend(handle_input_event(app, &mut main_view, event));
                needs_render = true;
            }
            maybe_update = ui_rx.recv() => {
                let Some(update) = maybe_update else {
                    debug!("UI queue closed");
                    break;
                };
                needs_render |= app.apply_ui_update(update);
                for update in ui_rx.drain() {
                    needs_render |= app.apply_ui_update(update);
                }
            }
            _ = ticker.tick() => {
                effects.extend(main_view.handle_message(app, &Msg::Tick));
                needs_render = animating;
            }
            _ = signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        if !effects.is_empty() {
            needs_render = true;
            for effect in effects {
                app.run_effect(effect);
            }
        }
        if app.should_quit() {
            break;
        }
        if needs_render {
            render(terminal, app, &mut main_view)?;
        }
    }
    Ok(())
}
