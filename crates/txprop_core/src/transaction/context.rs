//! Transaction context and state.

use crate::types::{Propagation, TransactionId};
use txprop_storage::SavepointId;

/// State of a physical transaction.
///
/// `Active` is the only non-terminal state. Rollback-only is a latch on an
/// active transaction, not a state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is open and accepts work.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    RolledBack,
}

impl TransactionState {
    /// Returns true for `Committed` and `RolledBack`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active)
    }
}

/// One unit of work as seen by the code that began it.
///
/// Contexts are handed out by [`crate::Session::begin`] and consumed by
/// [`crate::Session::complete`], so each one is completed at most once.
/// Participants share the identifier of the physical transaction they
/// joined.
#[derive(Debug, PartialEq, Eq)]
pub struct TransactionContext {
    id: TransactionId,
    depth: usize,
    is_new: bool,
    propagation: Propagation,
    /// Transaction suspended beneath the owning physical transaction.
    parent: Option<TransactionId>,
    savepoint: Option<SavepointId>,
}

impl TransactionContext {
    pub(crate) fn owner(
        id: TransactionId,
        propagation: Propagation,
        parent: Option<TransactionId>,
    ) -> Self {
        Self {
            id,
            depth: 0,
            is_new: true,
            propagation,
            parent,
            savepoint: None,
        }
    }

    pub(crate) fn participant(
        id: TransactionId,
        depth: usize,
        propagation: Propagation,
        parent: Option<TransactionId>,
        savepoint: Option<SavepointId>,
    ) -> Self {
        Self {
            id,
            depth,
            is_new: false,
            propagation,
            parent,
            savepoint,
        }
    }

    /// Returns the physical transaction this context belongs to.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the nesting depth within the physical transaction.
    ///
    /// Owners are at depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if this context started the physical transaction.
    #[must_use]
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Returns the propagation this context was begun with.
    #[must_use]
    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Returns the suspended transaction that resumes when the owning
    /// physical transaction completes.
    #[must_use]
    pub fn parent(&self) -> Option<TransactionId> {
        self.parent
    }

    /// Returns the savepoint of a nested participant.
    #[must_use]
    pub fn savepoint(&self) -> Option<SavepointId> {
        self.savepoint
    }

    /// Returns true for a participant running inside a savepoint.
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.savepoint.is_some()
    }
}
