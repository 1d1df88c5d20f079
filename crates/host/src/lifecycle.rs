//! Plugin lifecycle management.
//!
//! ```text
//! Discovered ──► Loaded ──► Started ◄──► Stopped
//!      │            │           │            │
//!      └────────────┴─────► Failed ◄─────────┘
//! ```
//!
//! `Failed` is terminal.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use opsdeck_types::{FailureCause, PluginState};
use tracing::{debug, warn};

use crate::registry::PluginRecord;

const HISTORY_LIMIT: usize = 64;

/// One applied state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub plugin: String,
    pub from: PluginState,
    pub to: PluginState,
    pub at: DateTime<Local>,
}

/// Applies legal transitions to plugin records and remembers recent ones.
#[derive(Debug, Default)]
pub struct LifecycleManager {
    history: VecDeque<Transition>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_legal(from: PluginState, to: PluginState) -> bool {
        use PluginState::*;
        matches!(
            (from, to),
            (Discovered, Loaded)
                | (Loaded, Started)
                | (Started, Stopped)
                | (Stopped, Started)
                | (Discovered | Loaded | Started | Stopped, Failed)
        )
    }

    /// Moves `record` to `to`, stamping start/stop times.
    pub fn transition(&mut self, record: &mut PluginRecord, to: PluginState) -> Result<(), LifecycleError> {
        let from = record.state;
        if !Self::is_legal(from, to) {
            warn!(plugin = %record.name, %from, %to, "Rejected lifecycle transition");
            return Err(LifecycleError::IllegalTransition {
                name: record.name.clone(),
                from,
                to,
            });
        }
        let now = Local::now();
        match to {
            PluginState::Started => record.started_at = Some(now),
            PluginState::Stopped => record.stopped_at = Some(now),
            _ => {}
        }
        record.state = to;
        debug!(plugin = %record.name, %from, %to, "Lifecycle transition");
        self.remember(Transition {
            plugin: record.name.clone(),
            from,
            to,
            at: now,
        });
        Ok(())
    }

    /// Moves `record` to `Failed` with `cause`.
    pub fn fail(&mut self, record: &mut PluginRecord, cause: FailureCause) -> Result<(), LifecycleError> {
        self.transition(record, PluginState::Failed)?;
        warn!(plugin = %record.name, cause = %cause, "Plugin failed");
        record.failure = Some(cause);
        Ok(())
    }

    /// Most recent transitions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Transition> {
        self.history.iter()
    }

    fn remember(&mut self, transition: Transition) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(transition);
    }
}

/// Errors that can occur during lifecycle management.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("illegal lifecycle transition for {name}: {from} -> {to}")]
    IllegalTransition {
        name: String,
        from: PluginState,
        to: PluginState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle_is_legal_and_stamped() {
        let mut manager = LifecycleManager::new();
        let mut record = PluginRecord::new("redis", "/plugins/redis/redis.plugin");
        for state in [PluginState::Loaded, PluginState::Started, PluginState::Stopped, PluginState::Started] {
            manager.transition(&mut record, state).expect("legal");
        }
        assert_eq!(record.state, PluginState::Started);
        assert!(record.started_at.is_some());
        assert!(record.stopped_at.is_some());
        assert_eq!(manager.history().count(), 4);
    }

    #[test]
    fn failed_is_terminal() {
        let mut manager = LifecycleManager::new();
        let mut record = PluginRecord::new("redis", "/plugins/redis/redis.plugin");
        manager
            .fail(&mut record, FailureCause::LoadFailed("bad yaml".into()))
            .expect("fail");
        assert_eq!(record.failure, Some(FailureCause::LoadFailed("bad yaml".into())));
        let error = manager.transition(&mut record, PluginState::Loaded).expect_err("terminal");
        assert!(error.to_string().contains("Failed -> Loaded"));
        assert!(manager.fail(&mut record, FailureCause::Fault("again".into())).is_err());
    }

    #[test]
    fn cannot_start_before_loading() {
        let mut manager = LifecycleManager::new();
        let mut record = PluginRecord::new("redis", "/plugins/redis/redis.plugin");
        assert!(manager.transition(&mut record, PluginState::Started).is_err());
        assert_eq!(record.state, PluginState::Discovered);
        assert_eq!(manager.history().count(), 0);
    }
}
