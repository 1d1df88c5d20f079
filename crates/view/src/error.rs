use std::time::Duration;

use thiserror::Error;

/// Errors produced while refreshing or configuring a view.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The backend could not be reached.
    #[error("{0}")]
    ConnectFailed(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("invalid key chord `{0}`")]
    InvalidKeyChord(String),
}

impl ViewError {
    pub fn connect_failed(message: impl ToString) -> Self {
        Self::ConnectFailed(message.to_string())
    }

    pub fn failed(message: impl ToString) -> Self {
        Self::Failed(message.to_string())
    }
}
