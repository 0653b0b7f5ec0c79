//! Coordinator statistics.
//!
//! Counts logical coordinator decisions (joins, suspensions, latches), as
//! opposed to the backend's physical counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Coordinator counters.
///
/// All counters are atomic and shared by every session of a coordinator.
#[derive(Debug, Default)]
pub struct CoordinatorStats {
    /// Physical transactions started.
    started: AtomicU64,
    /// Participants that joined an existing transaction.
    joined: AtomicU64,
    /// Nested participants (savepoints).
    nested: AtomicU64,
    /// Transactions suspended by `RequiresNew`.
    suspended: AtomicU64,
    /// Physical commits.
    committed: AtomicU64,
    /// Physical rollbacks.
    rolled_back: AtomicU64,
    /// Rollback-only latches set.
    rollback_only_marks: AtomicU64,
    /// `UnexpectedRollback` errors raised.
    unexpected_rollbacks: AtomicU64,
}

impl CoordinatorStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    // === Increment methods (internal use) ===

    pub(crate) fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_join(&self) {
        self.joined.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_nested(&self) {
        self.nested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suspend(&self) {
        self.suspended.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback_only(&self) {
        self.rollback_only_marks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unexpected_rollback(&self) {
        self.unexpected_rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    // === Getter methods (public API) ===

    /// Returns the number of physical transactions started.
    pub fn started(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    /// Returns the number of joins.
    pub fn joined(&self) -> u64 {
        self.joined.load(Ordering::Relaxed)
    }

    /// Returns the number of nested participants.
    pub fn nested(&self) -> u64 {
        self.nested.load(Ordering::Relaxed)
    }

    /// Returns the number of suspensions.
    pub fn suspended(&self) -> u64 {
        self.suspended.load(Ordering::Relaxed)
    }

    /// Returns the number of physical commits.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of physical rollbacks.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of rollback-only latches set.
    pub fn rollback_only_marks(&self) -> u64 {
        self.rollback_only_marks.load(Ordering::Relaxed)
    }

    /// Returns the number of unexpected rollbacks reported.
    pub fn unexpected_rollbacks(&self) -> u64 {
        self.unexpected_rollbacks.load(Ordering::Relaxed)
    }
}
