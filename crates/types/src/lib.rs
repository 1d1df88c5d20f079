//! Shared type definitions for the Opsdeck host, its view engine and plugins.
//!
//! Everything in this crate is plain data: plugin metadata and lifecycle
//! state, status-line log lines, and the messages/effects exchanged between
//! host-level UI components.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Self-reported description of a plugin module.
///
/// Supplied by the module after it is instantiated; the host does not trust
/// any of these fields until the module passed contract validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Unique identifier; must match the plugin directory name.
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Architectures the module supports (e.g. `x86_64`, `aarch64`).
    /// Empty means "any".
    #[serde(default)]
    pub supported_architectures: Vec<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl PluginMetadata {
    /// Convenience constructor for the two mandatory fields.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Whether the module declares support for the given architecture.
    pub fn supports_architecture(&self, arch: &str) -> bool {
        self.supported_architectures.is_empty() || self.supported_architectures.iter().any(|candidate| candidate == arch)
    }
}

/// Lifecycle state of a discovered plugin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PluginState {
    /// Artifact found on disk, not loaded yet.
    Discovered,
    /// Instantiated and validated; dormant.
    Loaded,
    /// Occupies the main content region.
    Started,
    /// Was started, has been stopped.
    Stopped,
    /// Terminal; the record carries a [`FailureCause`].
    Failed,
}

impl PluginState {
    /// Get the display icon for this state.
    pub fn icon(&self) -> &'static str {
        match self {
            PluginState::Discovered => "·",
            PluginState::Loaded => "○",
            PluginState::Started => "●",
            PluginState::Stopped => "○",
            PluginState::Failed => "✗",
        }
    }

    /// Get the display text for this state.
    pub fn display(&self) -> &'static str {
        match self {
            PluginState::Discovered => "Discovered",
            PluginState::Loaded => "Loaded",
            PluginState::Started => "Started",
            PluginState::Stopped => "Stopped",
            PluginState::Failed => "Failed",
        }
    }

    /// Loaded, stopped (dormant) and started plugins may be activated.
    pub fn is_startable(&self) -> bool {
        matches!(self, PluginState::Loaded | PluginState::Stopped | PluginState::Started)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PluginState::Failed)
    }
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// Why a plugin ended up in [`PluginState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureCause {
    /// The artifact could not be read or parsed.
    LoadFailed(String),
    /// The module does not satisfy the plugin contract.
    ContractViolation(String),
    /// `start` returned an error.
    StartFailed(String),
    /// A background task owned by the plugin panicked.
    Fault(String),
}

impl FailureCause {
    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FailureCause::LoadFailed(_) => "LoadFailed",
            FailureCause::ContractViolation(_) => "ContractViolation",
            FailureCause::StartFailed(_) => "StartFailed",
            FailureCause::Fault(_) => "Fault",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FailureCause::LoadFailed(message)
            | FailureCause::ContractViolation(message)
            | FailureCause::StartFailed(message)
            | FailureCause::Fault(message) => message,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

/// Severity used for status-line messages and modal styling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "OK",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

/// A single line in the host status/log pane.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    /// Originating plugin name, or `host`.
    pub source: String,
    pub message: String,
}

impl LogLine {
    pub fn new(severity: Severity, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            severity,
            source: source.into(),
            message: message.into(),
        }
    }

    /// Render as `HH:MM:SS LEVEL [source] message`.
    pub fn display(&self) -> String {
        format!(
            "{} {:<5} [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity.label(),
            self.source,
            self.message
        )
    }
}

/// Messages delivered to host-level components.
#[derive(Debug, Clone)]
pub enum Msg {
    /// Periodic UI tick.
    Tick,
    /// Terminal resized.
    Resize(u16, u16),
}

/// Host-level modal overlays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modal {
    /// Read-only plugin inventory.
    PackageManager,
}

/// Side effects requested by host-level components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Stop the active plugin (if any) and start the named one.
    ActivatePlugin(String),
    ShowModal(Modal),
    CloseModal,
    ToggleLogs,
    /// Move keyboard focus to the next/previous region.
    FocusNext,
    FocusPrev,
    Quit,
}
