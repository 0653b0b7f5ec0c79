//! Coordinator configuration.

use crate::types::Propagation;

/// Configuration for a [`crate::TransactionCoordinator`].
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Whether a failed participant marks the whole physical transaction
    /// rollback-only. When disabled, participant failures are left to the
    /// owner to decide.
    pub global_rollback_on_participation_failure: bool,

    /// Whether `Propagation::Nested` may create savepoints.
    pub nested_transactions_allowed: bool,

    /// Whether a failed physical commit is rolled back explicitly, so that
    /// a failing rollback replaces the commit error. When disabled, the
    /// handle is still released, a release failure is only logged, and
    /// the commit error is returned.
    pub rollback_on_commit_failure: bool,

    /// Propagation used by callers that do not name one.
    pub default_propagation: Propagation,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            global_rollback_on_participation_failure: true,
            nested_transactions_allowed: true,
            rollback_on_commit_failure: false,
            default_propagation: Propagation::Required,
        }
    }
}

impl CoordinatorConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether participant failures latch rollback-only.
    #[must_use]
    pub const fn global_rollback_on_participation_failure(mut self, value: bool) -> Self {
        self.global_rollback_on_participation_failure = value;
        self
    }

    /// Sets whether nested savepoint transactions are allowed.
    #[must_use]
    pub const fn nested_transactions_allowed(mut self, value: bool) -> Self {
        self.nested_transactions_allowed = value;
        self
    }

    /// Sets whether a failed commit is rolled back explicitly.
    #[must_use]
    pub const fn rollback_on_commit_failure(mut self, value: bool) -> Self {
        self.rollback_on_commit_failure = value;
        self
    }

    /// Sets the default propagation.
    #[must_use]
    pub const fn default_propagation(mut self, value: Propagation) -> Self {
        self.default_propagation = value;
        self
    }
}
