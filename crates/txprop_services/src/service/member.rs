//! Member join service.

use crate::error::ServiceResult;
use crate::model::{Log, Member};
use crate::repository::{LogRepository, MemberRepository};
use std::sync::Arc;
use tracing::{info, warn};
use txprop_core::{Propagation, Session, TransactionCoordinator};

/// Where transaction boundaries sit for a [`MemberService`].
///
/// `None` means "no boundary at this layer".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionBoundaries {
    /// Boundary around the whole service call.
    pub service: Option<Propagation>,
    /// Boundary of the member repository's writes.
    pub member_repository: Option<Propagation>,
    /// Boundary of the log repository's writes.
    pub log_repository: Option<Propagation>,
}

impl TransactionBoundaries {
    /// No service boundary; each repository commits on its own.
    #[must_use]
    pub const fn outer_off() -> Self {
        Self {
            service: None,
            member_repository: Some(Propagation::Required),
            log_repository: Some(Propagation::Required),
        }
    }

    /// Only the service has a boundary; repositories run inside it.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            service: Some(Propagation::Required),
            member_repository: None,
            log_repository: None,
        }
    }

    /// Every layer has a `Required` boundary, so repositories join the
    /// service's transaction.
    #[must_use]
    pub const fn outer_on() -> Self {
        Self {
            service: Some(Propagation::Required),
            member_repository: Some(Propagation::Required),
            log_repository: Some(Propagation::Required),
        }
    }

    /// Like [`Self::outer_on`], but the log repository always runs in its
    /// own physical transaction.
    #[must_use]
    pub const fn log_requires_new() -> Self {
        Self {
            service: Some(Propagation::Required),
            member_repository: Some(Propagation::Required),
            log_repository: Some(Propagation::RequiresNew),
        }
    }
}

impl Default for TransactionBoundaries {
    fn default() -> Self {
        Self::outer_on()
    }
}

/// Joins members and records an audit log entry for each join.
#[derive(Debug, Clone)]
pub struct MemberService {
    members: MemberRepository,
    logs: LogRepository,
    boundary: Option<Propagation>,
}

impl MemberService {
    /// Creates a service and its repositories with the given boundaries.
    pub fn new(coordinator: Arc<TransactionCoordinator>, boundaries: TransactionBoundaries) -> Self {
        Self {
            members: MemberRepository::new(coordinator.clone(), boundaries.member_repository),
            logs: LogRepository::new(coordinator, boundaries.log_repository),
            boundary: boundaries.service,
        }
    }

    /// Returns the member repository.
    #[must_use]
    pub fn members(&self) -> &MemberRepository {
        &self.members
    }

    /// Returns the log repository.
    #[must_use]
    pub fn logs(&self) -> &LogRepository {
        &self.logs
    }

    /// Saves the member and the log entry. Any failure is returned.
    pub fn join_v1(&self, session: &mut Session, username: &str) -> ServiceResult<()> {
        self.within_boundary(session, |s| {
            let member = Member::new(username);
            let log = Log::new(username);

            info!("== calling member repository ==");
            self.members.save(s, &member)?;
            info!("== member repository done ==");

            info!("== calling log repository ==");
            self.logs.save(s, &log)?;
            info!("== log repository done ==");
            Ok(())
        })
    }

    /// Saves the member and the log entry. A failed log save is logged
    /// and swallowed so the join itself goes through.
    pub fn join_v2(&self, session: &mut Session, username: &str) -> ServiceResult<()> {
        self.within_boundary(session, |s| {
            let member = Member::new(username);
            let log = Log::new(username);

            info!("== calling member repository ==");
            self.members.save(s, &member)?;
            info!("== member repository done ==");

            info!("== calling log repository ==");
            if let Err(err) = self.logs.save(s, &log) {
                warn!(message = %log.message, error = %err, "log save failed, continuing with normal flow");
            }
            info!("== log repository done ==");
            Ok(())
        })
    }

    fn within_boundary<F>(&self, session: &mut Session, work: F) -> ServiceResult<()>
    where
        F: FnOnce(&mut Session) -> ServiceResult<()>,
    {
        match self.boundary {
            Some(propagation) => session.execute(propagation, |s, _| work(s)),
            None => work(session),
        }
    }
}
