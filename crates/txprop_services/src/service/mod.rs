//! Services.

mod member;
mod order;

pub use member::{MemberService, TransactionBoundaries};
pub use order::{OrderService, USERNAME_NOT_ENOUGH_MONEY, USERNAME_SYSTEM_FAILURE};
