//! Repositories.
//!
//! A repository write runs inside its own boundary: `Some(propagation)`
//! begins a context with that propagation, `None` means the repository has
//! no boundary of its own and requires the caller's transaction
//! (`Mandatory`). Lookups read committed state outside any transaction.

mod log;
mod member;
mod order;

pub use log::{LogRepository, LOG_FAILURE_MARKER, LOG_TABLE};
pub use member::{MemberRepository, MEMBER_TABLE};
pub use order::{OrderRepository, ORDER_TABLE};

use txprop_core::Propagation;

/// Resolves a repository boundary to the propagation used for its writes.
fn boundary_propagation(boundary: Option<Propagation>) -> Propagation {
    boundary.unwrap_or(Propagation::Mandatory)
}
