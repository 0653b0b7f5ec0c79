//! Log store.

use super::boundary_propagation;
use crate::codec;
use crate::error::{ServiceError, ServiceResult};
use crate::model::Log;
use std::sync::Arc;
use tracing::info;
use txprop_core::{Propagation, Session, TransactionCoordinator};

/// Table holding log entries, keyed by message.
pub const LOG_TABLE: &str = "log";

/// Messages containing this marker fail after being staged.
pub const LOG_FAILURE_MARKER: &str = "logException";

/// Stores [`Log`] records.
#[derive(Debug, Clone)]
pub struct LogRepository {
    coordinator: Arc<TransactionCoordinator>,
    boundary: Option<Propagation>,
}

impl LogRepository {
    /// Creates a repository with the given write boundary.
    pub fn new(coordinator: Arc<TransactionCoordinator>, boundary: Option<Propagation>) -> Self {
        Self {
            coordinator,
            boundary,
        }
    }

    /// Returns the write boundary.
    #[must_use]
    pub fn boundary(&self) -> Option<Propagation> {
        self.boundary
    }

    /// Saves a log entry.
    ///
    /// The write is staged before the failure marker is checked, so a
    /// failing save leaves a write that its transaction must discard.
    pub fn save(&self, session: &mut Session, log: &Log) -> ServiceResult<()> {
        info!(message = %log.message, "saving log");
        let bytes = codec::encode(log)?;
        session.execute(
            boundary_propagation(self.boundary),
            |s, ctx| -> ServiceResult<()> {
                s.put(ctx, LOG_TABLE, &log.message, bytes)?;
                if log.message.contains(LOG_FAILURE_MARKER) {
                    info!(message = %log.message, "log save raised an exception");
                    return Err(ServiceError::runtime("log save failed"));
                }
                Ok(())
            },
        )
    }

    /// Looks up a committed log entry.
    pub fn find(&self, message: &str) -> ServiceResult<Option<Log>> {
        self.coordinator
            .read_committed(LOG_TABLE, message)?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }
}
