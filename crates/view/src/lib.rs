//! Interactive view runtime shared by every Opsdeck plugin.
//!
//! - [`CoreView`]: table model, key bindings, typed actions, navigation stack,
//!   overlays and background refresh.
//! - [`RootView`]: the pane set a plugin returns from `start`.
//! - [`UiSender`]/[`UiReceiver`]: the bounded queue through which background
//!   work reaches the single UI loop.
//! - [`RenderSurface`]: the per-plugin handle that creates views and spawns
//!   guarded tasks.

mod action;
mod core_view;
mod error;
mod keys;
mod queue;
mod render;
mod root_view;
mod surface;
mod task;
pub mod theme;

pub use action::ViewAction;
pub use core_view::{
    ActionHandler, CoreView, DEFAULT_REFRESH_TIMEOUT, KeyBinding, KeyHandler, LOADING_MESSAGE, NO_DATA_MESSAGE, Overlay,
    RefreshCallback, Rows, RowsKind, StatusLine,
};
pub use error::ViewError;
pub use keys::KeyChord;
pub use queue::{QueueClosed, UI_QUEUE_CAPACITY, UiReceiver, UiSender, UiUpdate, ViewId, ViewIdAllocator, ViewOp, ui_queue, ui_queue_with_capacity};
pub use render::truncate_to_width;
pub use root_view::RootView;
pub use surface::RenderSurface;
pub use task::{ConnectionGate, TaskSpawner, panic_message, run_blocking};
