//! Per-call-chain transaction stack.

use crate::error::{RollbackRule, TxError, TxResult};
use crate::transaction::context::{TransactionContext, TransactionState};
use crate::transaction::coordinator::TransactionCoordinator;
use crate::types::{Outcome, Propagation, TransactionId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use txprop_storage::{PhysicalHandle, SavepointId};

/// One physical transaction on the session stack.
#[derive(Debug)]
struct Frame {
    id: TransactionId,
    handle: PhysicalHandle,
    propagation: Propagation,
    rollback_only: bool,
    /// Participants (joined or nested) begun and not yet completed,
    /// innermost last.
    participants: Vec<Participant>,
    /// Frame directly beneath this one, suspended while this one runs.
    parent: Option<TransactionId>,
}

/// An open participant of a frame.
#[derive(Debug)]
struct Participant {
    savepoint: Option<SavepointId>,
    /// Frame latch when the participant began. Restored when the
    /// participant rolls back to its savepoint.
    rollback_only_at_begin: bool,
}

/// The transaction stack of one logical call chain.
///
/// The top frame is the current transaction; every frame beneath it was
/// suspended by a `RequiresNew` begin and resumes when the frame above it
/// completes. A session is passed explicitly as `&mut Session` through the
/// service and repository calls of one operation. Independent operations
/// use independent sessions.
///
/// Frames still active when the session is dropped are rolled back.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use txprop_core::{CoordinatorConfig, Outcome, Propagation, TransactionCoordinator};
/// use txprop_storage::InMemoryBackend;
///
/// let coordinator = Arc::new(TransactionCoordinator::new(
///     Arc::new(InMemoryBackend::new()),
///     CoordinatorConfig::default(),
/// ));
/// let mut session = coordinator.session();
///
/// let outer = session.begin(Propagation::Required).unwrap();
/// let inner = session.begin(Propagation::RequiresNew).unwrap();
/// assert_eq!(session.suspended_count(), 1);
///
/// session.complete(inner, Outcome::Failure).unwrap();
/// assert_eq!(session.current(), Some(outer.id()));
/// session.complete(outer, Outcome::Success).unwrap();
/// ```
pub struct Session {
    coordinator: Arc<TransactionCoordinator>,
    frames: Vec<Frame>,
}

impl Session {
    pub(crate) fn new(coordinator: Arc<TransactionCoordinator>) -> Self {
        Self {
            coordinator,
            frames: Vec::new(),
        }
    }

    /// Returns the coordinator this session belongs to.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }

    /// Begins a unit of work under the given propagation.
    ///
    /// # Errors
    ///
    /// - [`TxError::StorageUnavailable`] if a physical transaction is needed
    ///   and the backend cannot open one
    /// - [`TxError::NoActiveTransaction`] for `Mandatory` without a current
    ///   transaction
    /// - [`TxError::NestedTransactionNotSupported`] for `Nested` inside a
    ///   transaction when savepoints are disabled
    pub fn begin(&mut self, propagation: Propagation) -> TxResult<TransactionContext> {
        match propagation {
            Propagation::Required | Propagation::Nested if self.frames.is_empty() => {
                self.start(propagation)
            }
            Propagation::Required | Propagation::Mandatory => self.join(propagation),
            Propagation::RequiresNew => self.start(propagation),
            Propagation::Nested => self.nest(),
        }
    }

    /// Begins a unit of work under the configured default propagation.
    pub fn begin_default(&mut self) -> TxResult<TransactionContext> {
        let propagation = self.coordinator.config().default_propagation;
        self.begin(propagation)
    }

    /// Completes a unit of work.
    ///
    /// Returns the state of the physical transaction after the call:
    /// `Active` for participants, `Committed` or `RolledBack` for owners.
    ///
    /// # Errors
    ///
    /// - [`TxError::UnexpectedRollback`] if an owner completes with
    ///   `Success` but the transaction was marked rollback-only; the
    ///   transaction has been rolled back
    /// - [`TxError::IllegalTransactionState`] if `ctx` does not belong to the
    ///   current transaction, a participant completes before the
    ///   participants it encloses, or an owner completes while participants
    ///   are still open; the stack is left unchanged
    /// - [`TxError::Storage`] if the backend fails to commit or roll back.
    ///   The context is finished regardless: a failed commit releases the
    ///   physical transaction, and a failed savepoint rollback marks it
    ///   rollback-only
    pub fn complete(
        &mut self,
        ctx: TransactionContext,
        outcome: Outcome,
    ) -> TxResult<TransactionState> {
        self.check_current(&ctx)?;
        if ctx.is_new() {
            self.complete_owner(ctx, outcome)
        } else {
            self.complete_participant(ctx, outcome)
        }
    }

    /// Runs `f` inside a unit of work and always completes it.
    ///
    /// `Ok` completes with `Success`. `Err(e)` completes with `Failure` when
    /// `e.rollback_on()` holds and with `Success` otherwise; in both cases
    /// `e` is returned. A failure while completing after `Err(e)` is logged
    /// and does not replace `e`.
    pub fn execute<T, E, F>(&mut self, propagation: Propagation, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Session, &TransactionContext) -> Result<T, E>,
        E: From<TxError> + RollbackRule,
    {
        let ctx = self.begin(propagation)?;
        match f(self, &ctx) {
            Ok(value) => {
                self.complete(ctx, Outcome::Success)?;
                Ok(value)
            }
            Err(err) => {
                let outcome = if err.rollback_on() {
                    Outcome::Failure
                } else {
                    Outcome::Success
                };
                let txid = ctx.id();
                if let Err(secondary) = self.complete(ctx, outcome) {
                    error!(
                        txid = %txid,
                        error = %secondary,
                        "completing transaction after application error failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Marks the transaction `ctx` belongs to as rollback-only.
    pub fn set_rollback_only(&mut self, ctx: &TransactionContext) -> TxResult<()> {
        self.check_current(ctx)?;
        if let Some(frame) = self.frames.last_mut() {
            if !frame.rollback_only {
                self.coordinator.stats().record_rollback_only();
            }
            frame.rollback_only = true;
            debug!(txid = %frame.id, "transaction marked rollback-only");
        }
        Ok(())
    }

    /// Returns whether the transaction `ctx` belongs to is rollback-only.
    ///
    /// Works for suspended transactions too.
    pub fn is_rollback_only(&self, ctx: &TransactionContext) -> TxResult<bool> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.id == ctx.id())
            .map(|frame| frame.rollback_only)
            .ok_or_else(|| TxError::illegal_state(format!("{} is not on this session", ctx.id())))
    }

    /// Returns the current transaction, if any.
    #[must_use]
    pub fn current(&self) -> Option<TransactionId> {
        self.frames.last().map(|frame| frame.id)
    }

    /// Returns true if a transaction is current.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Returns the number of physical transactions on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns the number of suspended transactions.
    #[must_use]
    pub fn suspended_count(&self) -> usize {
        self.frames.len().saturating_sub(1)
    }

    /// Stages a write in the transaction `ctx` belongs to.
    pub fn put(
        &self,
        ctx: &TransactionContext,
        table: &str,
        key: &str,
        value: Vec<u8>,
    ) -> TxResult<()> {
        let handle = self.handle_for(ctx)?;
        Ok(self.coordinator.storage().put(handle, table, key, value)?)
    }

    /// Stages a delete in the transaction `ctx` belongs to.
    pub fn delete(&self, ctx: &TransactionContext, table: &str, key: &str) -> TxResult<()> {
        let handle = self.handle_for(ctx)?;
        Ok(self.coordinator.storage().delete(handle, table, key)?)
    }

    /// Reads through the transaction `ctx` belongs to.
    pub fn get(
        &self,
        ctx: &TransactionContext,
        table: &str,
        key: &str,
    ) -> TxResult<Option<Vec<u8>>> {
        let handle = self.handle_for(ctx)?;
        Ok(self.coordinator.storage().get(Some(handle), table, key)?)
    }

    fn handle_for(&self, ctx: &TransactionContext) -> TxResult<PhysicalHandle> {
        self.check_current(ctx)?;
        self.frames
            .last()
            .map(|frame| frame.handle)
            .ok_or(TxError::NoActiveTransaction)
    }

    fn check_current(&self, ctx: &TransactionContext) -> TxResult<()> {
        match self.frames.last() {
            Some(frame) if frame.id == ctx.id() => Ok(()),
            Some(frame) => Err(TxError::illegal_state(format!(
                "{} is not the current transaction {}",
                ctx.id(),
                frame.id
            ))),
            None => Err(TxError::illegal_state(format!(
                "{} used outside of any transaction",
                ctx.id()
            ))),
        }
    }

    fn start(&mut self, propagation: Propagation) -> TxResult<TransactionContext> {
        let handle = self
            .coordinator
            .storage()
            .open_transaction()
            .map_err(TxError::from_open)?;
        let id = self.coordinator.next_id();
        let parent = self.current();

        if let Some(suspended) = parent {
            self.coordinator.stats().record_suspend();
            debug!(txid = %id, suspended = %suspended, "suspending current transaction");
        }

        self.frames.push(Frame {
            id,
            handle,
            propagation,
            rollback_only: false,
            participants: Vec::new(),
            parent,
        });
        self.coordinator.stats().record_start();
        debug!(txid = %id, handle = %handle, %propagation, "began new transaction");

        Ok(TransactionContext::owner(id, propagation, parent))
    }

    fn join(&mut self, propagation: Propagation) -> TxResult<TransactionContext> {
        let frame = self
            .frames
            .last_mut()
            .ok_or(TxError::NoActiveTransaction)?;
        frame.participants.push(Participant {
            savepoint: None,
            rollback_only_at_begin: frame.rollback_only,
        });
        let depth = frame.participants.len();
        self.coordinator.stats().record_join();
        debug!(
            txid = %frame.id,
            depth,
            %propagation,
            "participating in existing transaction"
        );

        Ok(TransactionContext::participant(
            frame.id,
            depth,
            propagation,
            frame.parent,
            None,
        ))
    }

    fn nest(&mut self) -> TxResult<TransactionContext> {
        if !self.coordinator.config().nested_transactions_allowed {
            return Err(TxError::NestedTransactionNotSupported);
        }

        let frame = self
            .frames
            .last_mut()
            .ok_or(TxError::NoActiveTransaction)?;
        let savepoint = self.coordinator.storage().create_savepoint(frame.handle)?;
        frame.participants.push(Participant {
            savepoint: Some(savepoint),
            rollback_only_at_begin: frame.rollback_only,
        });
        let depth = frame.participants.len();
        self.coordinator.stats().record_nested();
        debug!(
            txid = %frame.id,
            %savepoint,
            depth,
            "created savepoint for nested transaction"
        );

        Ok(TransactionContext::participant(
            frame.id,
            depth,
            Propagation::Nested,
            frame.parent,
            Some(savepoint),
        ))
    }

    fn complete_participant(
        &mut self,
        ctx: TransactionContext,
        outcome: Outcome,
    ) -> TxResult<TransactionState> {
        let config = self.coordinator.config();
        let storage = self.coordinator.storage();
        let stats = self.coordinator.stats();
        let frame = self
            .frames
            .last_mut()
            .ok_or(TxError::NoActiveTransaction)?;

        if ctx.depth() != frame.participants.len() {
            return Err(TxError::illegal_state(format!(
                "participant at depth {} of {} is not the innermost of {} open",
                ctx.depth(),
                frame.id,
                frame.participants.len()
            )));
        }
        // Pop first: a failing savepoint call must not strand the owner.
        let participant = frame.participants.pop().ok_or_else(|| {
            TxError::illegal_state(format!("{} has no open participants", frame.id))
        })?;

        if let Some(savepoint) = participant.savepoint {
            match outcome {
                Outcome::Success => {
                    storage.release_savepoint(frame.handle, savepoint)?;
                    debug!(txid = %frame.id, %savepoint, "released savepoint");
                }
                Outcome::Failure => {
                    if let Err(err) = storage.rollback_to_savepoint(frame.handle, savepoint) {
                        // Nested writes are still staged.
                        if !frame.rollback_only {
                            stats.record_rollback_only();
                        }
                        frame.rollback_only = true;
                        return Err(err.into());
                    }
                    frame.rollback_only = participant.rollback_only_at_begin;
                    debug!(txid = %frame.id, %savepoint, "rolled back nested transaction to savepoint");
                }
            }
            return Ok(TransactionState::Active);
        }

        if outcome == Outcome::Failure {
            if config.global_rollback_on_participation_failure {
                if !frame.rollback_only {
                    stats.record_rollback_only();
                }
                frame.rollback_only = true;
                debug!(
                    txid = %frame.id,
                    depth = ctx.depth(),
                    "participating transaction failed - marking existing transaction as rollback-only"
                );
            } else {
                debug!(
                    txid = %frame.id,
                    depth = ctx.depth(),
                    "participating transaction failed - leaving rollback decision to the owner"
                );
            }
        }

        Ok(TransactionState::Active)
    }

    fn complete_owner(
        &mut self,
        ctx: TransactionContext,
        outcome: Outcome,
    ) -> TxResult<TransactionState> {
        let open = self.frames.last().map_or(0, |frame| frame.participants.len());
        if open > 0 {
            return Err(TxError::illegal_state(format!(
                "{} completed while {open} participant(s) are still open",
                ctx.id()
            )));
        }

        let frame = self.frames.pop().ok_or(TxError::NoActiveTransaction)?;
        let result = match outcome {
            Outcome::Failure => self
                .rollback_frame(&frame)
                .map(|()| TransactionState::RolledBack),
            Outcome::Success if frame.rollback_only => {
                self.rollback_frame(&frame)?;
                self.coordinator.stats().record_unexpected_rollback();
                warn!(
                    txid = %frame.id,
                    "commit requested but transaction is rollback-only - rolled back"
                );
                Err(TxError::UnexpectedRollback { id: frame.id })
            }
            Outcome::Success => self
                .commit_frame(&frame)
                .map(|()| TransactionState::Committed),
        };

        if let Some(parent) = frame.parent {
            debug!(txid = %parent, completed = %frame.id, "resuming suspended transaction");
        }

        result
    }

    fn commit_frame(&self, frame: &Frame) -> TxResult<()> {
        let storage = self.coordinator.storage();
        let err = match storage.commit(frame.handle) {
            Ok(()) => {
                self.coordinator.stats().record_commit();
                info!(txid = %frame.id, propagation = %frame.propagation, "committed transaction");
                return Ok(());
            }
            Err(err) => err,
        };

        // The frame is already popped, so the handle is released here.
        match storage.rollback(frame.handle) {
            Ok(()) => {
                self.coordinator.stats().record_rollback();
                info!(txid = %frame.id, error = %err, "rolled back transaction after failed commit");
                Err(err.into())
            }
            Err(rollback_err) if self.coordinator.config().rollback_on_commit_failure => {
                error!(
                    txid = %frame.id,
                    error = %err,
                    "commit error overridden by rollback error"
                );
                Err(rollback_err.into())
            }
            Err(rollback_err) => {
                error!(
                    txid = %frame.id,
                    error = %rollback_err,
                    "releasing handle after failed commit also failed"
                );
                Err(err.into())
            }
        }
    }

    fn rollback_frame(&self, frame: &Frame) -> TxResult<()> {
        self.coordinator.storage().rollback(frame.handle)?;
        self.coordinator.stats().record_rollback();
        info!(txid = %frame.id, propagation = %frame.propagation, "rolled back transaction");
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        while let Some(frame) = self.frames.pop() {
            warn!(txid = %frame.id, "session dropped with active transaction - rolling back");
            match self.coordinator.storage().rollback(frame.handle) {
                Ok(()) => self.coordinator.stats().record_rollback(),
                Err(err) => error!(txid = %frame.id, error = %err, "rollback on drop failed"),
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("current", &self.current())
            .field("depth", &self.depth())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use txprop_storage::{InMemoryBackend, StorageBackend, StorageError};

    fn setup_with(config: CoordinatorConfig) -> (Arc<InMemoryBackend>, Arc<TransactionCoordinator>) {
        let backend = Arc::new(InMemoryBackend::new());
        let coordinator = Arc::new(TransactionCoordinator::new(backend.clone(), config));
        (backend, coordinator)
    }

    fn setup() -> (Arc<InMemoryBackend>, Arc<TransactionCoordinator>) {
        setup_with(CoordinatorConfig::default())
    }

    #[derive(Debug)]
    enum AppError {
        Business,
        Runtime,
        Tx(TxError),
    }

    impl From<TxError> for AppError {
        fn from(err: TxError) -> Self {
            Self::Tx(err)
        }
    }

    impl RollbackRule for AppError {
        fn rollback_on(&self) -> bool {
            !matches!(self, Self::Business)
        }
    }

    #[test]
    fn required_without_current_starts_new() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        assert!(ctx.is_new());
        assert_eq!(ctx.depth(), 0);
        assert_eq!(session.current(), Some(ctx.id()));
        assert_eq!(backend.stats().opened(), 1);

        let state = session.complete(ctx, Outcome::Success).unwrap();
        assert_eq!(state, TransactionState::Committed);
        assert!(!session.is_active());
    }

    #[test]
    fn required_with_current_joins() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let inner = session.begin(Propagation::Required).unwrap();

        assert!(!inner.is_new());
        assert_eq!(inner.id(), outer.id());
        assert_eq!(inner.depth(), 1);
        assert_eq!(backend.stats().opened(), 1);

        assert_eq!(
            session.complete(inner, Outcome::Success).unwrap(),
            TransactionState::Active
        );
        assert_eq!(backend.stats().committed(), 0);
        session.complete(outer, Outcome::Success).unwrap();
        assert_eq!(backend.stats().committed(), 1);
    }

    #[test]
    fn nested_joins_finish_with_one_physical_commit() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let a = session.begin(Propagation::Required).unwrap();
        let b = session.begin(Propagation::Required).unwrap();
        assert_eq!(b.depth(), 2);
        session.put(&b, "member", "x", vec![1]).unwrap();
        session.complete(b, Outcome::Success).unwrap();
        session.complete(a, Outcome::Success).unwrap();
        session.complete(outer, Outcome::Success).unwrap();

        let stats = backend.stats().snapshot();
        assert_eq!(stats.opened, 1);
        assert_eq!(stats.finished(), 1);
        assert_eq!(backend.row_count("member"), 1);
    }

    #[test]
    fn joined_failure_forces_unexpected_rollback() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        session.put(&outer, "member", "m", vec![1]).unwrap();
        let inner = session.begin(Propagation::Required).unwrap();
        session.complete(inner, Outcome::Failure).unwrap();
        assert!(session.is_rollback_only(&outer).unwrap());

        let err = session.complete(outer, Outcome::Success).unwrap_err();
        assert!(err.is_unexpected_rollback());
        assert_eq!(backend.row_count("member"), 0);
        assert_eq!(backend.stats().rolled_back(), 1);
        assert_eq!(coordinator.stats().unexpected_rollbacks(), 1);
        assert!(!session.is_active());
    }

    #[test]
    fn owner_failure_rolls_back() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        session.put(&ctx, "member", "m", vec![1]).unwrap();
        let state = session.complete(ctx, Outcome::Failure).unwrap();

        assert_eq!(state, TransactionState::RolledBack);
        assert_eq!(backend.row_count("member"), 0);
    }

    #[test]
    fn requires_new_suspends_and_resumes() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        session.put(&outer, "member", "m", vec![1]).unwrap();

        let inner = session.begin(Propagation::RequiresNew).unwrap();
        assert!(inner.is_new());
        assert_ne!(inner.id(), outer.id());
        assert_eq!(inner.parent(), Some(outer.id()));
        assert_eq!(session.suspended_count(), 1);

        session.put(&inner, "log", "l", vec![2]).unwrap();
        session.complete(inner, Outcome::Failure).unwrap();

        assert_eq!(session.current(), Some(outer.id()));
        assert!(!session.is_rollback_only(&outer).unwrap());
        session.complete(outer, Outcome::Success).unwrap();

        assert_eq!(backend.row_count("member"), 1);
        assert_eq!(backend.row_count("log"), 0);
    }

    #[test]
    fn requires_new_commit_survives_outer_rollback() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let inner = session.begin(Propagation::RequiresNew).unwrap();
        session.put(&inner, "log", "l", vec![2]).unwrap();
        session.complete(inner, Outcome::Success).unwrap();
        session.complete(outer, Outcome::Failure).unwrap();

        assert_eq!(backend.row_count("log"), 1);
    }

    #[test]
    fn requires_new_keeps_suspended_rollback_only() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let joined = session.begin(Propagation::Required).unwrap();
        session.complete(joined, Outcome::Failure).unwrap();

        let inner = session.begin(Propagation::RequiresNew).unwrap();
        assert!(!session.is_rollback_only(&inner).unwrap());
        assert!(session.is_rollback_only(&outer).unwrap());
        assert_eq!(
            session.complete(inner, Outcome::Success).unwrap(),
            TransactionState::Committed
        );

        assert!(session.is_rollback_only(&outer).unwrap());
        assert!(session
            .complete(outer, Outcome::Success)
            .unwrap_err()
            .is_unexpected_rollback());
    }

    #[test]
    fn mandatory_without_current_fails() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let err = session.begin(Propagation::Mandatory).unwrap_err();
        assert!(matches!(err, TxError::NoActiveTransaction));
        assert_eq!(backend.stats().opened(), 0);
    }

    #[test]
    fn mandatory_joins_current() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let inner = session.begin(Propagation::Mandatory).unwrap();
        assert_eq!(inner.id(), outer.id());
        assert_eq!(inner.propagation(), Propagation::Mandatory);
        session.complete(inner, Outcome::Success).unwrap();
        session.complete(outer, Outcome::Success).unwrap();
    }

    #[test]
    fn nested_failure_rolls_back_to_savepoint_only() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        session.put(&outer, "member", "m", vec![1]).unwrap();

        let nested = session.begin(Propagation::Nested).unwrap();
        assert!(nested.is_nested());
        assert!(!nested.is_new());
        session.put(&nested, "log", "l", vec![2]).unwrap();
        session.complete(nested, Outcome::Failure).unwrap();

        assert!(!session.is_rollback_only(&outer).unwrap());
        session.complete(outer, Outcome::Success).unwrap();

        assert_eq!(backend.row_count("member"), 1);
        assert_eq!(backend.row_count("log"), 0);
        assert_eq!(backend.stats().savepoint_rollbacks(), 1);
    }

    #[test]
    fn nested_participants_complete_innermost_first() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let _outer = session.begin(Propagation::Required).unwrap();
        let n1 = session.begin(Propagation::Nested).unwrap();
        let n2 = session.begin(Propagation::Nested).unwrap();

        let err = session.complete(n1, Outcome::Failure).unwrap_err();
        assert!(matches!(err, TxError::IllegalTransactionState { .. }));
        assert_eq!(backend.stats().savepoint_rollbacks(), 0);

        // n2's savepoint survived the rejected call.
        assert_eq!(
            session.complete(n2, Outcome::Success).unwrap(),
            TransactionState::Active
        );

        drop(session);
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn failed_savepoint_release_does_not_strand_owner() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        session.put(&outer, "member", "m", vec![1]).unwrap();
        let nested = session.begin(Propagation::Nested).unwrap();
        let savepoint = nested.savepoint().unwrap();
        backend.release_savepoint(PhysicalHandle(1), savepoint).unwrap();

        let err = session.complete(nested, Outcome::Success).unwrap_err();
        assert!(matches!(
            err,
            TxError::Storage(StorageError::UnknownSavepoint { .. })
        ));

        assert_eq!(
            session.complete(outer, Outcome::Success).unwrap(),
            TransactionState::Committed
        );
        assert_eq!(session.depth(), 0);
        assert_eq!(backend.row_count("member"), 1);
    }

    #[test]
    fn failed_savepoint_rollback_marks_rollback_only() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let nested = session.begin(Propagation::Nested).unwrap();
        session.put(&nested, "log", "l", vec![2]).unwrap();
        backend
            .release_savepoint(PhysicalHandle(1), nested.savepoint().unwrap())
            .unwrap();

        assert!(session.complete(nested, Outcome::Failure).is_err());
        assert!(session.is_rollback_only(&outer).unwrap());

        let err = session.complete(outer, Outcome::Success).unwrap_err();
        assert!(err.is_unexpected_rollback());
        assert_eq!(backend.row_count("log"), 0);
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn nested_rollback_clears_latch_set_inside_it() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        session.put(&outer, "member", "m", vec![1]).unwrap();
        let nested = session.begin(Propagation::Nested).unwrap();
        let joined = session.begin(Propagation::Required).unwrap();
        session.put(&joined, "log", "l", vec![2]).unwrap();
        session.complete(joined, Outcome::Failure).unwrap();
        assert!(session.is_rollback_only(&outer).unwrap());

        session.complete(nested, Outcome::Failure).unwrap();
        assert!(!session.is_rollback_only(&outer).unwrap());

        session.complete(outer, Outcome::Success).unwrap();
        assert_eq!(backend.row_count("member"), 1);
        assert_eq!(backend.row_count("log"), 0);
    }

    #[test]
    fn nested_rollback_keeps_latch_set_before_it() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let joined = session.begin(Propagation::Required).unwrap();
        session.complete(joined, Outcome::Failure).unwrap();

        let nested = session.begin(Propagation::Nested).unwrap();
        session.complete(nested, Outcome::Failure).unwrap();

        assert!(session.is_rollback_only(&outer).unwrap());
        assert!(session
            .complete(outer, Outcome::Success)
            .unwrap_err()
            .is_unexpected_rollback());
    }

    #[test]
    fn nested_success_keeps_writes() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let nested = session.begin(Propagation::Nested).unwrap();
        session.put(&nested, "log", "l", vec![2]).unwrap();
        session.complete(nested, Outcome::Success).unwrap();
        session.complete(outer, Outcome::Success).unwrap();

        assert_eq!(backend.row_count("log"), 1);
    }

    #[test]
    fn nested_without_current_starts_new() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Nested).unwrap();
        assert!(ctx.is_new());
        assert!(!ctx.is_nested());
        session.complete(ctx, Outcome::Success).unwrap();
    }

    #[test]
    fn nested_disabled_is_rejected() {
        let (_backend, coordinator) =
            setup_with(CoordinatorConfig::new().nested_transactions_allowed(false));
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let err = session.begin(Propagation::Nested).unwrap_err();
        assert!(matches!(err, TxError::NestedTransactionNotSupported));
        session.complete(outer, Outcome::Success).unwrap();
    }

    #[test]
    fn begin_fails_when_storage_unavailable() {
        let (backend, coordinator) = setup();
        backend.set_available(false);
        let mut session = coordinator.session();

        let err = session.begin(Propagation::Required).unwrap_err();
        assert!(matches!(err, TxError::StorageUnavailable { .. }));
        assert!(!session.is_active());
    }

    #[test]
    fn requires_new_fails_when_storage_unavailable_and_keeps_outer() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        backend.set_available(false);
        assert!(session.begin(Propagation::RequiresNew).is_err());
        assert_eq!(session.current(), Some(outer.id()));
        session.complete(outer, Outcome::Success).unwrap();
    }

    #[test]
    fn completing_suspended_context_is_illegal() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let _inner = session.begin(Propagation::RequiresNew).unwrap();

        let err = session.complete(outer, Outcome::Success).unwrap_err();
        assert!(matches!(err, TxError::IllegalTransactionState { .. }));
        assert_eq!(session.depth(), 2);

        drop(session);
        assert_eq!(backend.stats().rolled_back(), 2);
        assert_eq!(backend.open_count(), 0);
    }

    #[test]
    fn owner_with_open_participants_is_illegal() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let _inner = session.begin(Propagation::Required).unwrap();

        let err = session.complete(outer, Outcome::Success).unwrap_err();
        assert!(matches!(err, TxError::IllegalTransactionState { .. }));
        assert!(session.is_active());
    }

    #[test]
    fn participant_failure_without_global_latch_commits() {
        let (backend, coordinator) = setup_with(
            CoordinatorConfig::new().global_rollback_on_participation_failure(false),
        );
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        session.put(&outer, "member", "m", vec![1]).unwrap();
        let inner = session.begin(Propagation::Required).unwrap();
        session.complete(inner, Outcome::Failure).unwrap();
        session.complete(outer, Outcome::Success).unwrap();

        assert_eq!(backend.row_count("member"), 1);
    }

    #[test]
    fn set_rollback_only_forces_unexpected_rollback() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        session.set_rollback_only(&ctx).unwrap();
        assert!(session
            .complete(ctx, Outcome::Success)
            .unwrap_err()
            .is_unexpected_rollback());
    }

    #[test]
    fn commit_failure_releases_handle() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        session.put(&ctx, "member", "m", vec![1]).unwrap();
        backend.fail_next_commit();
        let err = session.complete(ctx, Outcome::Success).unwrap_err();

        assert!(matches!(
            err,
            TxError::Storage(StorageError::CommitFailed { .. })
        ));
        assert!(!session.is_active());
        drop(session);
        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.row_count("member"), 0);
    }

    #[test]
    fn commit_failure_surfaces_commit_error_when_release_fails() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        backend.fail_next_commit();
        backend.fail_next_rollback();
        let err = session.complete(ctx, Outcome::Success).unwrap_err();

        assert!(matches!(
            err,
            TxError::Storage(StorageError::CommitFailed { .. })
        ));
    }

    #[test]
    fn rollback_error_overrides_commit_error_when_configured() {
        let (backend, coordinator) =
            setup_with(CoordinatorConfig::new().rollback_on_commit_failure(true));
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        backend.fail_next_commit();
        backend.fail_next_rollback();
        let err = session.complete(ctx, Outcome::Success).unwrap_err();

        assert!(matches!(
            err,
            TxError::Storage(StorageError::RollbackFailed { .. })
        ));
    }

    #[test]
    fn commit_failure_rolls_back_when_configured() {
        let (backend, coordinator) =
            setup_with(CoordinatorConfig::new().rollback_on_commit_failure(true));
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        session.put(&ctx, "member", "m", vec![1]).unwrap();
        backend.fail_next_commit();
        assert!(session.complete(ctx, Outcome::Success).is_err());

        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.stats().rolled_back(), 1);
        assert_eq!(backend.row_count("member"), 0);
    }

    #[test]
    fn dropping_session_rolls_back_active() {
        let (backend, coordinator) = setup();
        {
            let mut session = coordinator.session();
            let ctx = session.begin(Propagation::Required).unwrap();
            session.put(&ctx, "member", "m", vec![1]).unwrap();
        }
        assert_eq!(backend.open_count(), 0);
        assert_eq!(backend.row_count("member"), 0);
        assert_eq!(coordinator.stats().rolled_back(), 1);
    }

    #[test]
    fn reads_see_own_writes() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let ctx = session.begin(Propagation::Required).unwrap();
        session.put(&ctx, "member", "m", vec![7]).unwrap();
        assert_eq!(session.get(&ctx, "member", "m").unwrap(), Some(vec![7]));
        assert!(coordinator.read_committed("member", "m").unwrap().is_none());

        session.delete(&ctx, "member", "m").unwrap();
        assert!(session.get(&ctx, "member", "m").unwrap().is_none());
        session.complete(ctx, Outcome::Success).unwrap();
    }

    #[test]
    fn writing_through_suspended_context_is_illegal() {
        let (_backend, coordinator) = setup();
        let mut session = coordinator.session();

        let outer = session.begin(Propagation::Required).unwrap();
        let inner = session.begin(Propagation::RequiresNew).unwrap();
        let err = session.put(&outer, "member", "m", vec![1]).unwrap_err();
        assert!(matches!(err, TxError::IllegalTransactionState { .. }));
        session.complete(inner, Outcome::Success).unwrap();
        session.complete(outer, Outcome::Success).unwrap();
    }

    #[test]
    fn execute_commits_on_ok() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let value = session
            .execute(Propagation::Required, |s, ctx| -> Result<u32, AppError> {
                s.put(ctx, "member", "m", vec![1])?;
                Ok(5)
            })
            .unwrap();

        assert_eq!(value, 5);
        assert_eq!(backend.row_count("member"), 1);
    }

    #[test]
    fn execute_rolls_back_on_runtime_error() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let result = session.execute(Propagation::Required, |s, ctx| -> Result<(), AppError> {
            s.put(ctx, "member", "m", vec![1])?;
            Err(AppError::Runtime)
        });

        assert!(matches!(result, Err(AppError::Runtime)));
        assert_eq!(backend.row_count("member"), 0);
        assert!(!session.is_active());
    }

    #[test]
    fn execute_commits_on_business_error() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let result = session.execute(Propagation::Required, |s, ctx| -> Result<(), AppError> {
            s.put(ctx, "orders", "o", vec![1])?;
            Err(AppError::Business)
        });

        assert!(matches!(result, Err(AppError::Business)));
        assert_eq!(backend.row_count("orders"), 1);
    }

    #[test]
    fn execute_surfaces_unexpected_rollback() {
        let (backend, coordinator) = setup();
        let mut session = coordinator.session();

        let result = session.execute(Propagation::Required, |s, ctx| -> Result<(), AppError> {
            s.put(ctx, "member", "m", vec![1])?;
            let inner: Result<(), AppError> =
                s.execute(Propagation::Required, |_, _| Err(AppError::Runtime));
            assert!(inner.is_err());
            Ok(())
        });

        assert!(matches!(result, Err(AppError::Tx(TxError::UnexpectedRollback { .. }))));
        assert_eq!(backend.row_count("member"), 0);
    }

    #[test]
    fn execute_propagates_begin_failure() {
        let (backend, coordinator) = setup();
        backend.set_available(false);
        let mut session = coordinator.session();

        let result: Result<(), AppError> = session.execute(Propagation::Required, |_, _| Ok(()));
        assert!(matches!(
            result,
            Err(AppError::Tx(TxError::StorageUnavailable { .. }))
        ));
    }

    #[test]
    fn begin_default_uses_config() {
        let (_backend, coordinator) =
            setup_with(CoordinatorConfig::new().default_propagation(Propagation::RequiresNew));
        let mut session = coordinator.session();

        let outer = session.begin_default().unwrap();
        let inner = session.begin_default().unwrap();
        assert!(inner.is_new());
        session.complete(inner, Outcome::Success).unwrap();
        session.complete(outer, Outcome::Success).unwrap();
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        fn participant() -> impl Strategy<Value = (Propagation, bool)> {
            (
                prop_oneof![Just(Propagation::Required), Just(Propagation::Nested)],
                any::<bool>(),
            )
        }

        proptest! {
            #[test]
            fn latch_follows_joined_failures(
                participants in proptest::collection::vec(participant(), 0..12),
            ) {
                let (backend, coordinator) = setup();
                let mut session = coordinator.session();

                let outer = session.begin(Propagation::Required).unwrap();
                for (i, (propagation, fails)) in participants.iter().enumerate() {
                    let ctx = session.begin(*propagation).unwrap();
                    session.put(&ctx, "t", &format!("k{i:02}"), vec![1]).unwrap();
                    let outcome = if *fails { Outcome::Failure } else { Outcome::Success };
                    session.complete(ctx, outcome).unwrap();
                }

                let latched = participants
                    .iter()
                    .any(|(p, fails)| *p == Propagation::Required && *fails);
                prop_assert_eq!(session.is_rollback_only(&outer).unwrap(), latched);

                let result = session.complete(outer, Outcome::Success);
                prop_assert_eq!(
                    result.as_ref().is_err_and(|e| e.is_unexpected_rollback()),
                    latched
                );

                let kept = if latched {
                    0
                } else {
                    participants
                        .iter()
                        .filter(|(p, fails)| !(*p == Propagation::Nested && *fails))
                        .count()
                };
                prop_assert_eq!(backend.row_count("t"), kept);
                prop_assert_eq!(backend.stats().snapshot().finished(), 1);
                prop_assert_eq!(backend.open_count(), 0);
            }
        }
    }
}
