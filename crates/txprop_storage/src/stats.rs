//! Backend statistics.
//!
//! Counters for physical transaction activity. The coordinator's guarantee
//! that only owners touch storage is checked against these numbers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Physical transaction counters.
///
/// All counters are atomic and can be read while transactions are running.
#[derive(Debug, Default)]
pub struct BackendStats {
    /// Physical transactions opened.
    opened: AtomicU64,
    /// Physical transactions committed.
    committed: AtomicU64,
    /// Physical transactions rolled back.
    rolled_back: AtomicU64,
    /// Savepoints rolled back to.
    savepoint_rollbacks: AtomicU64,
    /// Rows written by commits.
    rows_written: AtomicU64,
}

impl BackendStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self) {
        self.opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, rows: u64) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        self.rows_written.fetch_add(rows, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_savepoint_rollback(&self) {
        self.savepoint_rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of physical transactions opened.
    pub fn opened(&self) -> u64 {
        self.opened.load(Ordering::Relaxed)
    }

    /// Returns the number of physical commits.
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    /// Returns the number of physical rollbacks.
    pub fn rolled_back(&self) -> u64 {
        self.rolled_back.load(Ordering::Relaxed)
    }

    /// Returns the number of savepoint rollbacks.
    pub fn savepoint_rollbacks(&self) -> u64 {
        self.savepoint_rollbacks.load(Ordering::Relaxed)
    }

    /// Returns the number of physical transactions neither committed nor
    /// rolled back.
    pub fn active(&self) -> u64 {
        self.opened()
            .saturating_sub(self.committed())
            .saturating_sub(self.rolled_back())
    }

    /// Takes a point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            opened: self.opened(),
            committed: self.committed(),
            rolled_back: self.rolled_back(),
            savepoint_rollbacks: self.savepoint_rollbacks(),
            rows_written: self.rows_written.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of [`BackendStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Physical transactions opened.
    pub opened: u64,
    /// Physical commits.
    pub committed: u64,
    /// Physical rollbacks.
    pub rolled_back: u64,
    /// Savepoint rollbacks.
    pub savepoint_rollbacks: u64,
    /// Rows written by commits.
    pub rows_written: u64,
}

impl StatsSnapshot {
    /// Returns the number of finished physical transactions.
    #[must_use]
    pub fn finished(&self) -> u64 {
        self.committed + self.rolled_back
    }

    /// Returns the change between an earlier snapshot and this one.
    #[must_use]
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            opened: self.opened - earlier.opened,
            committed: self.committed - earlier.committed,
            rolled_back: self.rolled_back - earlier.rolled_back,
            savepoint_rollbacks: self.savepoint_rollbacks - earlier.savepoint_rollbacks,
            rows_written: self.rows_written - earlier.rows_written,
        }
    }
}
