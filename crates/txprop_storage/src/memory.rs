//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use crate::stats::BackendStats;
use crate::types::{PhysicalHandle, SavepointId};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

type Table = BTreeMap<String, Vec<u8>>;

/// A staged write inside an open physical transaction.
#[derive(Debug, Clone)]
enum StagedWrite {
    Put {
        table: String,
        key: String,
        value: Vec<u8>,
    },
    Delete {
        table: String,
        key: String,
    },
}

impl StagedWrite {
    fn targets(&self, table: &str, key: &str) -> bool {
        match self {
            Self::Put { table: t, key: k, .. } | Self::Delete { table: t, key: k } => {
                t == table && k == key
            }
        }
    }
}

/// Staged state of one open physical transaction.
#[derive(Debug, Default)]
struct OpenTransaction {
    writes: Vec<StagedWrite>,
    /// Savepoints with the write-log length at creation time, oldest first.
    savepoints: Vec<(SavepointId, usize)>,
}

#[derive(Debug, Default)]
struct Registry {
    open: HashMap<PhysicalHandle, OpenTransaction>,
    next_handle: u64,
    next_savepoint: u64,
}

/// An in-memory transactional backend.
///
/// Committed rows live in per-table ordered maps. Each open physical
/// transaction keeps an append-only log of staged writes that is replayed
/// onto the committed tables on commit and dropped on rollback.
///
/// The backend can be switched unavailable (every `open_transaction`
/// fails) and can be told to fail the next commit or rollback, which is how tests reach
/// the coordinator's storage failure paths.
///
/// # Example
///
/// ```rust
/// use txprop_storage::{InMemoryBackend, StorageBackend};
///
/// let backend = InMemoryBackend::new();
/// let handle = backend.open_transaction().unwrap();
/// backend.put(handle, "log", "hello", vec![1]).unwrap();
/// backend.rollback(handle).unwrap();
/// assert!(backend.get(None, "log", "hello").unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    tables: RwLock<BTreeMap<String, Table>>,
    registry: Mutex<Registry>,
    unavailable: AtomicBool,
    fail_next_commit: AtomicBool,
    fail_next_rollback: AtomicBool,
    stats: BackendStats,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `open_transaction` fail (or succeed again).
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Makes the next `commit` fail once, leaving its handle open.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Makes the next `rollback` fail once, leaving its handle open.
    pub fn fail_next_rollback(&self) {
        self.fail_next_rollback.store(true, Ordering::SeqCst);
    }

    /// Returns the physical transaction counters.
    #[must_use]
    pub fn stats(&self) -> &BackendStats {
        &self.stats
    }

    /// Returns the number of physical transactions currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.registry.lock().open.len()
    }

    /// Returns the number of committed rows in a table.
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, BTreeMap::len)
    }

    /// Removes all committed rows. Open transactions are left alone.
    pub fn clear(&self) {
        self.tables.write().clear();
    }

    fn with_open<R>(
        &self,
        handle: PhysicalHandle,
        f: impl FnOnce(&mut OpenTransaction) -> StorageResult<R>,
    ) -> StorageResult<R> {
        let mut registry = self.registry.lock();
        let txn = registry
            .open
            .get_mut(&handle)
            .ok_or(StorageError::UnknownHandle(handle))?;
        f(txn)
    }
}

impl StorageBackend for InMemoryBackend {
    fn open_transaction(&self) -> StorageResult<PhysicalHandle> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("in-memory backend switched off"));
        }

        let mut registry = self.registry.lock();
        registry.next_handle += 1;
        let handle = PhysicalHandle::new(registry.next_handle);
        registry.open.insert(handle, OpenTransaction::default());
        self.stats.record_open();
        Ok(handle)
    }

    fn put(
        &self,
        handle: PhysicalHandle,
        table: &str,
        key: &str,
        value: Vec<u8>,
    ) -> StorageResult<()> {
        self.with_open(handle, |txn| {
            txn.writes.push(StagedWrite::Put {
                table: table.to_string(),
                key: key.to_string(),
                value,
            });
            Ok(())
        })
    }

    fn delete(&self, handle: PhysicalHandle, table: &str, key: &str) -> StorageResult<()> {
        self.with_open(handle, |txn| {
            txn.writes.push(StagedWrite::Delete {
                table: table.to_string(),
                key: key.to_string(),
            });
            Ok(())
        })
    }

    fn get(
        &self,
        handle: Option<PhysicalHandle>,
        table: &str,
        key: &str,
    ) -> StorageResult<Option<Vec<u8>>> {
        if let Some(handle) = handle {
            let staged = self.with_open(handle, |txn| {
                // Latest staged write wins
                Ok(txn
                    .writes
                    .iter()
                    .rev()
                    .find(|w| w.targets(table, key))
                    .cloned())
            })?;
            match staged {
                Some(StagedWrite::Put { value, .. }) => return Ok(Some(value)),
                Some(StagedWrite::Delete { .. }) => return Ok(None),
                None => {}
            }
        }

        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    fn scan(&self, table: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(self
            .tables
            .read()
            .get(table)
            .map(|rows| rows.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn commit(&self, handle: PhysicalHandle) -> StorageResult<()> {
        let mut registry = self.registry.lock();
        if !registry.open.contains_key(&handle) {
            return Err(StorageError::UnknownHandle(handle));
        }
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StorageError::CommitFailed {
                handle,
                message: "injected commit failure".to_string(),
            });
        }

        let txn = registry
            .open
            .remove(&handle)
            .ok_or(StorageError::UnknownHandle(handle))?;
        let rows = txn.writes.len() as u64;

        let mut tables = self.tables.write();
        for write in txn.writes {
            match write {
                StagedWrite::Put { table, key, value } => {
                    tables.entry(table).or_default().insert(key, value);
                }
                StagedWrite::Delete { table, key } => {
                    if let Some(rows) = tables.get_mut(&table) {
                        rows.remove(&key);
                    }
                }
            }
        }

        self.stats.record_commit(rows);
        Ok(())
    }

    fn rollback(&self, handle: PhysicalHandle) -> StorageResult<()> {
        let mut registry = self.registry.lock();
        if !registry.open.contains_key(&handle) {
            return Err(StorageError::UnknownHandle(handle));
        }
        if self.fail_next_rollback.swap(false, Ordering::SeqCst) {
            return Err(StorageError::RollbackFailed {
                handle,
                message: "injected rollback failure".to_string(),
            });
        }
        registry
            .open
            .remove(&handle)
            .ok_or(StorageError::UnknownHandle(handle))?;
        self.stats.record_rollback();
        Ok(())
    }

    fn create_savepoint(&self, handle: PhysicalHandle) -> StorageResult<SavepointId> {
        let mut registry = self.registry.lock();
        registry.next_savepoint += 1;
        let savepoint = SavepointId::new(registry.next_savepoint);
        let txn = registry
            .open
            .get_mut(&handle)
            .ok_or(StorageError::UnknownHandle(handle))?;
        let mark = txn.writes.len();
        txn.savepoints.push((savepoint, mark));
        Ok(savepoint)
    }

    fn rollback_to_savepoint(
        &self,
        handle: PhysicalHandle,
        savepoint: SavepointId,
    ) -> StorageResult<()> {
        self.with_open(handle, |txn| {
            let index = txn
                .savepoints
                .iter()
                .position(|(id, _)| *id == savepoint)
                .ok_or(StorageError::UnknownSavepoint { handle, savepoint })?;
            let mark = txn.savepoints[index].1;
            txn.writes.truncate(mark);
            txn.savepoints.truncate(index);
            Ok(())
        })?;
        self.stats.record_savepoint_rollback();
        Ok(())
    }

    fn release_savepoint(
        &self,
        handle: PhysicalHandle,
        savepoint: SavepointId,
    ) -> StorageResult<()> {
        self.with_open(handle, |txn| {
            let index = txn
                .savepoints
                .iter()
                .position(|(id, _)| *id == savepoint)
                .ok_or(StorageError::UnknownSavepoint { handle, savepoint })?;
            txn.savepoints.remove(index);
            Ok(())
        })
    }
}
