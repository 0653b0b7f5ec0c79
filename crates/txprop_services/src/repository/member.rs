//! Member store.

use super::boundary_propagation;
use crate::codec;
use crate::error::ServiceResult;
use crate::model::Member;
use std::sync::Arc;
use tracing::info;
use txprop_core::{Propagation, Session, TransactionCoordinator};

/// Table holding members, keyed by username.
pub const MEMBER_TABLE: &str = "member";

/// Stores [`Member`] records.
#[derive(Debug, Clone)]
pub struct MemberRepository {
    coordinator: Arc<TransactionCoordinator>,
    boundary: Option<Propagation>,
}

impl MemberRepository {
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

    /// Saves a member.
    pub fn save(&self, session: &mut Session, member: &Member) -> ServiceResult<()> {
        info!(username = %member.username, "saving member");
        let bytes = codec::encode(member)?;
        session.execute(
            boundary_propagation(self.boundary),
            |s, ctx| -> ServiceResult<()> {
                s.put(ctx, MEMBER_TABLE, &member.username, bytes)?;
                Ok(())
            },
        )
    }

    /// Looks up a committed member.
    pub fn find(&self, username: &str) -> ServiceResult<Option<Member>> {
        self.coordinator
            .read_committed(MEMBER_TABLE, username)?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }
}
