//! # txprop Core
//!
//! Transaction coordinator for txprop.
//!
//! This crate provides:
//! - [`TransactionCoordinator`]: shared configuration, storage and statistics
//! - [`Session`]: the explicit per-call-chain stack of physical transactions
//! - [`Propagation`] policies deciding whether a unit of work joins the
//!   current transaction, suspends it, or marks a savepoint inside it
//! - The rollback-only latch and [`TxError::UnexpectedRollback`]
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use txprop_core::{CoordinatorConfig, Outcome, Propagation, TransactionCoordinator};
//! use txprop_storage::InMemoryBackend;
//!
//! let coordinator = Arc::new(TransactionCoordinator::new(
//!     Arc::new(InMemoryBackend::new()),
//!     CoordinatorConfig::default(),
//! ));
//! let mut session = coordinator.session();
//!
//! let outer = session.begin(Propagation::Required).unwrap();
//! let inner = session.begin(Propagation::Required).unwrap();
//! assert!(!inner.is_new());
//!
//! session.complete(inner, Outcome::Failure).unwrap();
//! assert!(session.complete(outer, Outcome::Success).unwrap_err().is_unexpected_rollback());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod stats;
mod transaction;
mod types;

pub use config::CoordinatorConfig;
pub use error::{RollbackRule, TxError, TxResult};
pub use stats::CoordinatorStats;
pub use transaction::{Session, TransactionContext, TransactionCoordinator, TransactionState};
pub use types::{Outcome, Propagation, TransactionId};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
