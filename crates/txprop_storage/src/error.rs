//! Error types for storage operations.

use crate::types::{PhysicalHandle, SavepointId};
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend cannot open a physical transaction right now.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The handle does not refer to an open physical transaction.
    #[error("unknown or finished transaction handle {0}")]
    UnknownHandle(PhysicalHandle),

    /// The savepoint does not exist in the given transaction.
    #[error("unknown savepoint {savepoint} in {handle}")]
    UnknownSavepoint {
        /// The physical transaction searched.
        handle: PhysicalHandle,
        /// The savepoint that was not found.
        savepoint: SavepointId,
    },

    /// The backend refused to commit.
    #[error("commit of {handle} failed: {message}")]
    CommitFailed {
        /// The physical transaction that failed to commit.
        handle: PhysicalHandle,
        /// Description of the failure.
        message: String,
    },

    /// The backend refused to roll back.
    #[error("rollback of {handle} failed: {message}")]
    RollbackFailed {
        /// The physical transaction that failed to roll back.
        handle: PhysicalHandle,
        /// Description of the failure.
        message: String,
    },
}

impl StorageError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Returns true if this error means no physical transaction could be opened.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
