//! Error types for txprop core.

use crate::types::TransactionId;
use thiserror::Error;
use txprop_storage::StorageError;

/// Result type for coordinator operations.
pub type TxResult<T> = Result<T, TxError>;

/// Errors raised by the transaction coordinator.
#[derive(Debug, Error)]
pub enum TxError {
    /// No physical transaction could be opened.
    #[error("storage unavailable: {message}")]
    StorageUnavailable {
        /// Description from the backend.
        message: String,
    },

    /// A commit was requested but the transaction had been marked
    /// rollback-only by a participant, so it was rolled back instead.
    #[error("transaction {id} silently rolled back because it has been marked as rollback-only")]
    UnexpectedRollback {
        /// The transaction that was rolled back.
        id: TransactionId,
    },

    /// `Mandatory` propagation found no current transaction.
    #[error("no existing transaction found for propagation MANDATORY")]
    NoActiveTransaction,

    /// `Nested` propagation was requested but is disabled.
    #[error("nested transactions are not allowed by the coordinator configuration")]
    NestedTransactionNotSupported,

    /// The coordinator was used out of order.
    #[error("illegal transaction state: {message}")]
    IllegalTransactionState {
        /// Description of the misuse.
        message: String,
    },

    /// Any other storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl TxError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalTransactionState {
            message: message.into(),
        }
    }

    /// Maps a failure to open a physical transaction.
    pub(crate) fn from_open(err: StorageError) -> Self {
        match err {
            StorageError::Unavailable(message) => Self::StorageUnavailable { message },
            other => Self::Storage(other),
        }
    }

    /// Returns true for [`TxError::UnexpectedRollback`].
    #[must_use]
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, Self::UnexpectedRollback { .. })
    }
}

/// Decides whether an error ending a unit of work forces a rollback.
///
/// Errors that return `false` are business outcomes: the surrounding
/// transaction still commits and the error is handed back to the caller.
pub trait RollbackRule {
    /// Returns true if this error must roll the transaction back.
    fn rollback_on(&self) -> bool {
        true
    }
}

impl RollbackRule for TxError {}
