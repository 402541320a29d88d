//! Error taxonomy shared by the store, the driver and the apply path.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by load balancer operations.
#[derive(Debug, Error)]
pub enum LbaasError {
    /// Missing or malformed input, or a value outside a supported enum.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// A uniqueness constraint was violated.
    #[error("Duplicate {kind}: {name}")]
    DuplicateEntry { kind: &'static str, name: String },

    /// Listener still owns members and cannot be removed.
    #[error("Listener {name} still has {members} member(s)")]
    ListenerNotEmpty { name: String, members: usize },

    /// The artifact could not be replaced. The previous file is intact.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reload mechanism failed or timed out.
    #[error("Reload failed: {reason}")]
    Apply {
        reason: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// Persistence layer failure (I/O or encoding of the state file).
    #[error("Store error: {0}")]
    Store(String),
}

impl LbaasError {
    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn duplicate(kind: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateEntry {
            kind,
            name: name.into(),
        }
    }

    pub(crate) fn apply(reason: impl Into<String>) -> Self {
        Self::Apply {
            reason: reason.into(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound { .. } => "not_found",
            Self::DuplicateEntry { .. } => "duplicate_entry",
            Self::ListenerNotEmpty { .. } => "listener_not_empty",
            Self::Write { .. } => "write",
            Self::Apply { .. } => "apply",
            Self::Store(_) => "store",
        }
    }
}

/// Result type for load balancer operations.
pub type LbaasResult<T> = Result<T, LbaasError>;
