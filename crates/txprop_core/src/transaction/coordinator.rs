//! Transaction coordinator.

use crate::config::CoordinatorConfig;
use crate::error::TxResult;
use crate::stats::CoordinatorStats;
use crate::transaction::session::Session;
use crate::types::TransactionId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use txprop_storage::StorageBackend;

/// Coordinates physical transactions over a storage backend.
///
/// The coordinator itself holds no per-call-chain state. Each independent
/// top-level operation opens its own [`Session`], which carries the stack
/// of active and suspended transactions explicitly through the call chain.
/// Sessions share the coordinator's configuration, statistics and
/// transaction ID sequence.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use txprop_core::{CoordinatorConfig, TransactionCoordinator};
/// use txprop_storage::InMemoryBackend;
///
/// let coordinator = Arc::new(TransactionCoordinator::new(
///     Arc::new(InMemoryBackend::new()),
///     CoordinatorConfig::default(),
/// ));
/// let session = coordinator.session();
/// assert!(session.current().is_none());
/// ```
pub struct TransactionCoordinator {
    storage: Arc<dyn StorageBackend>,
    config: CoordinatorConfig,
    next_txid: AtomicU64,
    stats: CoordinatorStats,
}

impl TransactionCoordinator {
    /// Creates a new coordinator.
    pub fn new(storage: Arc<dyn StorageBackend>, config: CoordinatorConfig) -> Self {
        Self {
            storage,
            config,
            next_txid: AtomicU64::new(1),
            stats: CoordinatorStats::new(),
        }
    }

    /// Opens a new, empty session for one call chain.
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Returns the coordinator statistics.
    #[must_use]
    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    /// Reads committed state, outside of any transaction.
    pub fn read_committed(&self, table: &str, key: &str) -> TxResult<Option<Vec<u8>>> {
        Ok(self.storage.get(None, table, key)?)
    }

    /// Returns all committed rows of a table.
    pub fn scan_committed(&self, table: &str) -> TxResult<Vec<(String, Vec<u8>)>> {
        Ok(self.storage.scan(table)?)
    }

    pub(crate) fn next_id(&self) -> TransactionId {
        TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst))
    }
}

impl std::fmt::Debug for TransactionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("config", &self.config)
            .field("started", &self.stats.started())
            .finish_non_exhaustive()
    }
}
