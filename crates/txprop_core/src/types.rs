//! Core type definitions for txprop.

use std::fmt;

/// Unique identifier for a physical transaction.
///
/// Transaction IDs are monotonically increasing per coordinator and never
/// reused. Participants that join a transaction carry its ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Policy for how a unit of work relates to the current transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Propagation {
    /// Join the current transaction, or start one if there is none.
    #[default]
    Required,
    /// Always start an independent physical transaction, suspending the
    /// current one until this one completes.
    RequiresNew,
    /// Join the current transaction; fail if there is none.
    Mandatory,
    /// Run inside a savepoint of the current transaction, or start one if
    /// there is none.
    Nested,
}

impl Propagation {
    /// Returns the conventional upper-case name of this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::RequiresNew => "REQUIRES_NEW",
            Self::Mandatory => "MANDATORY",
            Self::Nested => "NESTED",
        }
    }
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a unit of work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The work finished normally and may be committed.
    Success,
    /// The work failed and must not be committed.
    Failure,
}

impl Outcome {
    /// Maps a result to an outcome.
    pub fn of<T, E>(result: &Result<T, E>) -> Self {
        if result.is_ok() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}
