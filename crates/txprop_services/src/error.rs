//! Error types for the service layer.

use thiserror::Error;
use txprop_core::{RollbackRule, TxError};

/// Result type for repository and service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Business rules a service can report as violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessRule {
    /// The customer's balance does not cover the order.
    NotEnoughMoney,
}

impl std::fmt::Display for BusinessRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEnoughMoney => f.write_str("not enough money"),
        }
    }
}

/// Errors raised by repositories and services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A recoverable domain outcome. Does not force a rollback.
    #[error("business rule violated: {0}")]
    BusinessRuleViolation(BusinessRule),

    /// Any unexpected failure. Always forces a rollback.
    #[error("runtime failure: {message}")]
    RuntimeFailure {
        /// Description of the failure.
        message: String,
    },

    /// Coordinator failure, including unexpected rollbacks.
    #[error("transaction error: {0}")]
    Transaction(#[from] TxError),

    /// A record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },
}

impl ServiceError {
    /// Creates a runtime failure.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::RuntimeFailure {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true if the coordinator reported an unexpected rollback.
    #[must_use]
    pub fn is_unexpected_rollback(&self) -> bool {
        matches!(self, Self::Transaction(err) if err.is_unexpected_rollback())
    }

    /// Returns true for business rule violations.
    #[must_use]
    pub fn is_business(&self) -> bool {
        matches!(self, Self::BusinessRuleViolation(_))
    }
}

impl RollbackRule for ServiceError {
    fn rollback_on(&self) -> bool {
        !self.is_business()
    }
}
