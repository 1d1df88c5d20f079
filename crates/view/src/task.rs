//! Guarded background work.
//!
//! Plugin tasks run on the tokio runtime behind a join watcher: a panic is
//! turned into a [`UiUpdate::Fault`] for the owning plugin instead of
//! unwinding into the host.

use std::any::Any;
use std::panic;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::task;
use tracing::{debug, error, warn};

use crate::queue::{UiSender, UiUpdate};

/// Shared "is the backend connected" flag consulted by auto-refresh.
#[derive(Debug, Clone)]
pub struct ConnectionGate(Arc<AtomicBool>);

impl ConnectionGate {
    pub fn new(connected: bool) -> Self {
        Self(Arc::new(AtomicBool::new(connected)))
    }

    /// A gate that never suspends.
    pub fn always_open() -> Self {
        Self::new(true)
    }

    pub fn is_connected(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.store(connected, Ordering::Release);
    }
}

impl Default for ConnectionGate {
    fn default() -> Self {
        Self::always_open()
    }
}

/// Spawns tasks on behalf of one plugin.
#[derive(Debug, Clone)]
pub struct TaskSpawner {
    ui: UiSender,
    owner: Arc<str>,
}

impl TaskSpawner {
    pub fn new(ui: UiSender, owner: impl Into<Arc<str>>) -> Self {
        Self { ui, owner: owner.into() }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn ui(&self) -> &UiSender {
        &self.ui
    }

    /// Runs `future` on the current runtime; a panic becomes a fault for the owner.
    ///
    /// Returns `false` when called outside a tokio runtime.
    pub fn spawn<F>(&self, label: &'static str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(plugin = %self.owner, task = label, "No async runtime; background task not started");
            return false;
        };
        let task = runtime.spawn(future);
        let ui = self.ui.clone();
        let owner = self.owner.clone();
        runtime.spawn(async move {
            match task.await {
                Ok(()) => {}
                Err(join_error) if join_error.is_panic() => {
                    let message = panic_message(join_error.into_panic());
                    error!(plugin = %owner, task = label, %message, "Plugin task panicked");
                    let _ = ui
                        .post(UiUpdate::Fault {
                            plugin: owner.to_string(),
                            message: format!("{label} task panicked: {message}"),
                        })
                        .await;
                }
                Err(_) => {}
            }
        });
        true
    }
}

/// Runs disk-bound or otherwise blocking work on tokio's blocking pool.
///
/// A panic in `call` resumes on the awaiting task, so a [`TaskSpawner`]
/// task still reports it as a fault. `None` means the runtime dropped the
/// work while shutting down.
pub async fn run_blocking<T, F>(call: F) -> Option<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    match task::spawn_blocking(call).await {
        Ok(value) => Some(value),
        Err(join_error) => match join_error.try_into_panic() {
            Ok(payload) => panic::resume_unwind(payload),
            Err(join_error) => {
                debug!(%join_error, "Blocking work cancelled");
                None
            }
        },
    }
}

pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::ui_queue;

    #[tokio::test]
    async fn panicking_task_reports_fault_for_owner() {
        let (tx, mut rx) = ui_queue();
        let spawner = TaskSpawner::new(tx, "redis");
        assert!(spawner.spawn("poller", async {
            panic!("lost connection state");
        }));

        match rx.recv().await {
            Some(UiUpdate::Fault { plugin, message }) => {
                assert_eq!(plugin, "redis");
                assert!(message.contains("lost connection state"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blocking_work_returns_its_value() {
        let value = run_blocking(|| 6 * 7).await;
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn panic_in_blocking_work_faults_the_spawning_task() {
        let (tx, mut rx) = ui_queue();
        let spawner = TaskSpawner::new(tx, "secrets");
        assert!(spawner.spawn("delete", async {
            let _: Option<()> = run_blocking(|| panic!("disk vanished")).await;
        }));

        match rx.recv().await {
            Some(UiUpdate::Fault { plugin, message }) => {
                assert_eq!(plugin, "secrets");
                assert!(message.contains("delete task panicked: disk vanished"));
            }
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn spawn_outside_runtime_is_refused() {
        let (tx, _rx) = ui_queue();
        let spawner = TaskSpawner::new(tx, "kafka");
        assert!(!spawner.spawn("noop", async {}));
    }

    #[test]
    fn gate_toggles() {
        let gate = ConnectionGate::new(false);
        let shared = gate.clone();
        assert!(!shared.is_connected());
        gate.set_connected(true);
        assert!(shared.is_connected());
    }
}
