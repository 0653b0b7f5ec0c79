//! # txprop Storage
//!
//! Storage backend trait and implementations for txprop.
//!
//! This crate provides the lowest-level storage abstraction used by the
//! transaction coordinator. Backends are **opaque byte stores** keyed by
//! `(table, key)` that know how to run physical transactions. They do not
//! interpret the records they store.
//!
//! ## Design Principles
//!
//! - One [`PhysicalHandle`] per physical transaction
//! - Writes are staged per handle and applied atomically on commit
//! - Savepoints mark a position in a handle's staged writes
//! - Must be `Send + Sync` so independent sessions can share a backend
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use txprop_storage::{InMemoryBackend, StorageBackend};
//!
//! let backend = InMemoryBackend::new();
//! let handle = backend.open_transaction().unwrap();
//! backend.put(handle, "member", "alice", b"alice".to_vec()).unwrap();
//! backend.commit(handle).unwrap();
//! assert_eq!(backend.get(None, "member", "alice").unwrap(), Some(b"alice".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod memory;
mod stats;
mod types;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryBackend;
pub use stats::{BackendStats, StatsSnapshot};
pub use types::{PhysicalHandle, SavepointId};
