//! Transaction coordination with propagation semantics.
//!
//! A [`Session`] is the stack of physical transactions belonging to one
//! call chain. Service and repository code receives it as `&mut Session`
//! and asks it to `begin` a [`TransactionContext`] under a propagation
//! policy, then `complete`s that context with an outcome:
//!
//! - **Owners** (`is_new`) physically commit or roll back
//! - **Participants** only latch rollback-only on failure
//! - **Nested participants** roll back to their own savepoint on failure
//! - `RequiresNew` suspends the current owner and resumes it afterwards

mod context;
mod coordinator;
mod session;

pub use context::{TransactionContext, TransactionState};
pub use coordinator::TransactionCoordinator;
pub use session::Session;
