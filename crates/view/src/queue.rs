//! The serialized "apply on UI thread" primitive.
//!
//! Background work never touches a [`CoreView`] directly. It posts boxed
//! closures onto a bounded queue that only the UI loop drains, so every
//! mutation of view state happens on one thread between render passes.
//! Updates are applied in the order they complete.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use opsdeck_types::LogLine;
use tokio::sync::mpsc;
use tracing::warn;

use crate::core_view::CoreView;

/// Capacity of the UI update queue.
pub const UI_QUEUE_CAPACITY: usize = 256;

/// Identifies a [`CoreView`] so queued updates can find their target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(u64);

impl ViewId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Hands out process-unique [`ViewId`]s.
#[derive(Debug, Clone, Default)]
pub struct ViewIdAllocator(Arc<AtomicU64>);

impl ViewIdAllocator {
    pub fn next(&self) -> ViewId {
        ViewId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// A mutation to run against one view on the UI thread.
pub type ViewOp = Box<dyn FnOnce(&mut CoreView) + Send>;

pub enum UiUpdate {
    Apply { target: ViewId, op: ViewOp },
    /// A line for the status/log pane.
    Log(LogLine),
    /// A guarded background task owned by `plugin` panicked.
    Fault { plugin: String, message: String },
    Redraw,
}

impl fmt::Debug for UiUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UiUpdate::Apply { target, .. } => f.debug_struct("Apply").field("target", target).finish_non_exhaustive(),
            UiUpdate::Log(line) => f.debug_tuple("Log").field(line).finish(),
            UiUpdate::Fault { plugin, message } => f
                .debug_struct("Fault")
                .field("plugin", plugin)
                .field("message", message)
                .finish(),
            UiUpdate::Redraw => f.write_str("Redraw"),
        }
    }
}

/// The queue has no receiver any more (the UI loop exited).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueClosed;

/// Producer side of the UI queue; cheap to clone into background tasks.
#[derive(Clone, Debug)]
pub struct UiSender {
    tx: mpsc::Sender<UiUpdate>,
}

impl UiSender {
    /// Waits for queue capacity.
    pub async fn post(&self, update: UiUpdate) -> Result<(), QueueClosed> {
        self.tx.send(update).await.map_err(|_| QueueClosed)
    }

    pub async fn apply<F>(&self, target: ViewId, op: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut CoreView) + Send + 'static,
    {
        self.post(UiUpdate::Apply {
            target,
            op: Box::new(op),
        })
        .await
    }

    /// Non-blocking post for synchronous callers on the UI thread; a full
    /// queue drops the update.
    pub fn try_post(&self, update: UiUpdate) -> bool {
        match self.tx.try_send(update) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(update)) => {
                warn!(?update, "UI queue full; dropping update");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the UI loop.
#[derive(Debug)]
pub struct UiReceiver {
    rx: mpsc::Receiver<UiUpdate>,
}

impl UiReceiver {
    pub async fn recv(&mut self) -> Option<UiUpdate> {
        self.rx.recv().await
    }

    /// Everything queued right now, in arrival order.
    pub fn drain(&mut self) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.rx.try_recv() {
            updates.push(update);
        }
        updates
    }
}

pub fn ui_queue() -> (UiSender, UiReceiver) {
    ui_queue_with_capacity(UI_QUEUE_CAPACITY)
}

pub fn ui_queue_with_capacity(capacity: usize) -> (UiSender, UiReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (UiSender { tx }, UiReceiver { rx })
}
