//! Storage backend trait definition.

use crate::error::StorageResult;
use crate::types::{PhysicalHandle, SavepointId};

/// A transactional storage backend.
///
/// Backends are **opaque byte stores** keyed by `(table, key)`. Every write
/// goes through a physical transaction identified by a [`PhysicalHandle`];
/// nothing becomes visible to other handles until `commit`.
///
/// # Invariants
///
/// - `commit` applies all staged writes of a handle atomically
/// - `rollback` discards them; both finish the handle
/// - `get` with a handle sees that handle's own staged writes
/// - `get` without a handle sees committed state only
/// - Backends must be `Send + Sync`; all methods take `&self`
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
pub trait StorageBackend: Send + Sync {
    /// Opens a new physical transaction.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::Unavailable`] if the backend cannot
    /// start a transaction.
    fn open_transaction(&self) -> StorageResult<PhysicalHandle>;

    /// Stages an insert or update of `(table, key)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not open.
    fn put(
        &self,
        handle: PhysicalHandle,
        table: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StorageResult<()>;

    /// Stages a delete of `(table, key)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not open.
    fn delete(&self, handle: PhysicalHandle, table: &str, key: &str) -> StorageResult<()>;

    /// Reads `(table, key)`.
    ///
    /// With `Some(handle)` the handle's staged writes shadow committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if a handle is given and it is not open.
    fn get(
        &self,
        handle: Option<PhysicalHandle>,
        table: &str,
        key: &str,
    ) -> StorageResult<Option<Vec<u8>>>;

    /// Returns all committed rows of a table, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn scan(&self, table: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Commits a physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not open or the commit fails. A
    /// failed commit leaves the handle open so the caller can roll it back.
    fn commit(&self, handle: PhysicalHandle) -> StorageResult<()>;

    /// Rolls back a physical transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not open.
    fn rollback(&self, handle: PhysicalHandle) -> StorageResult<()>;

    /// Marks the current position of a handle's staged writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle is not open.
    fn create_savepoint(&self, handle: PhysicalHandle) -> StorageResult<SavepointId>;

    /// Discards writes staged after `savepoint`, and every savepoint
    /// created after it. The savepoint itself is released.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle or savepoint does not exist.
    fn rollback_to_savepoint(
        &self,
        handle: PhysicalHandle,
        savepoint: SavepointId,
    ) -> StorageResult<()>;

    /// Forgets a savepoint, keeping the writes staged after it.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle or savepoint does not exist.
    fn release_savepoint(&self, handle: PhysicalHandle, savepoint: SavepointId)
        -> StorageResult<()>;
}
