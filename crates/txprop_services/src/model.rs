//! Stored records.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A registered member, keyed by username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Unique username.
    pub username: String,
}

impl Member {
    /// Creates a member.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
        }
    }
}

/// An audit log entry, keyed by its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Log message.
    pub message: String,
}

impl Log {
    /// Creates a log entry.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Identifier of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Generates a new random order ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayStatus {
    /// Paid in full.
    Complete,
    /// Waiting for the customer to pay from another account.
    Pending,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order ID, assigned at creation.
    pub id: OrderId,
    /// Ordering customer.
    pub username: String,
    /// Payment state; `None` until payment has been processed.
    pub pay_status: Option<PayStatus>,
}

impl Order {
    /// Creates an unpaid order with a fresh ID.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: OrderId::generate(),
            username: username.into(),
            pay_status: None,
        }
    }
}
