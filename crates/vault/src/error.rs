use thiserror::Error;

/// Errors surfaced by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No entry (or group of entries) at the requested location.
    #[error("{message}")]
    NotFound { path: String, message: String },

    /// The master key cannot open the database (wrong or missing key material).
    #[error("cannot decrypt vault: {reason}")]
    DecryptFailed { reason: String },

    /// The database file is not a valid vault.
    #[error("vault database is corrupt: {reason}")]
    Corrupt { reason: String },

    /// The database could not be persisted.
    #[error("failed to write vault: {reason}")]
    WriteFailed { reason: String },

    #[error("invalid secret path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The key could neither be read nor created.
    #[error("vault key unavailable: {reason}")]
    KeyUnavailable { reason: String },

    #[error("failed to watch vault: {reason}")]
    Watch { reason: String },
}

impl VaultError {
    pub fn not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::NotFound {
            message: format!("no entry at `{path}`"),
            path,
        }
    }

    /// Actionable message for an empty `<service>/<environment>` group.
    pub fn empty_group(service: &str, environment: &str) -> Self {
        Self::NotFound {
            path: format!("{service}/{environment}"),
            message: format!("no entries under `{service}/{environment}`; create one"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn write_failed(reason: impl ToString) -> Self {
        Self::WriteFailed {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn corrupt(reason: impl ToString) -> Self {
        Self::Corrupt {
            reason: reason.to_string(),
        }
    }
}
