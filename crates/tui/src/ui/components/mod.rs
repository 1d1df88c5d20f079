//! Host frame components: sidebar, plugin content, logs and the package
//! manager overlay.

pub mod component;
pub mod content;
pub mod logs;
pub mod package_manager;
pub mod sidebar;

pub(crate) use component::Component;
pub use content::PluginContentComponent;
pub use logs::{LogsComponent, LogsState};
pub use package_manager::{PackageManagerComponent, PackageManagerState};
pub use sidebar::{SidebarComponent, SidebarState};
