use std::future::Future;
use std::sync::Arc;

use crate::core_view::CoreView;
use crate::queue::{QueueClosed, UiSender, UiUpdate, ViewId, ViewIdAllocator};
use crate::task::TaskSpawner;

/// The slice of the host's rendering surface handed to one plugin.
#[derive(Debug, Clone)]
pub struct RenderSurface {
    plugin: Arc<str>,
    ids: ViewIdAllocator,
    spawner: TaskSpawner,
}

impl RenderSurface {
    pub fn new(plugin: impl Into<Arc<str>>, ui: UiSender, ids: ViewIdAllocator) -> Self {
        let plugin = plugin.into();
        Self {
            spawner: TaskSpawner::new(ui, plugin.clone()),
            plugin,
            ids,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    pub fn ui(&self) -> &UiSender {
        self.spawner.ui()
    }

    /// A fresh view owned by this plugin, its stack rooted at `root`.
    pub fn create_view(&self, root: impl Into<String>) -> CoreView {
        CoreView::new(self.ids.next(), self.spawner.clone(), root)
    }

    /// Runs `future` behind the fault guard.
    pub fn spawn<F>(&self, label: &'static str, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.spawner.spawn(label, future)
    }

    /// Queues `op` against `target` from background work.
    pub async fn apply<F>(&self, target: ViewId, op: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut CoreView) + Send + 'static,
    {
        self.spawner.ui().apply(target, op).await
    }

    pub fn request_redraw(&self) {
        self.spawner.ui().try_post(UiUpdate::Redraw);
    }
}
