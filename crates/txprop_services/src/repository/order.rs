//! Order store.

use super::boundary_propagation;
use crate::codec;
use crate::error::ServiceResult;
use crate::model::{Order, OrderId};
use std::sync::Arc;
use txprop_core::{Propagation, Session, TransactionCoordinator};

/// Table holding orders, keyed by order ID.
pub const ORDER_TABLE: &str = "orders";

/// Stores [`Order`] records.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    coordinator: Arc<TransactionCoordinator>,
    boundary: Option<Propagation>,
}

impl OrderRepository {
    /// Creates a repository with the given write boundary.
    pub fn new(coordinator: Arc<TransactionCoordinator>, boundary: Option<Propagation>) -> Self {
        Self {
            coordinator,
            boundary,
        }
    }

    /// Saves (inserts or replaces) an order.
    pub fn save(&self, session: &mut Session, order: &Order) -> ServiceResult<()> {
        let bytes = codec::encode(order)?;
        let key = order.id.to_string();
        session.execute(
            boundary_propagation(self.boundary),
            |s, ctx| -> ServiceResult<()> {
                s.put(ctx, ORDER_TABLE, &key, bytes)?;
                Ok(())
            },
        )
    }

    /// Looks up a committed order.
    pub fn find_by_id(&self, id: &OrderId) -> ServiceResult<Option<Order>> {
        self.coordinator
            .read_committed(ORDER_TABLE, &id.to_string())?
            .map(|bytes| codec::decode(&bytes))
            .transpose()
    }

    /// Returns all committed orders.
    pub fn find_all(&self) -> ServiceResult<Vec<Order>> {
        self.coordinator
            .scan_committed(ORDER_TABLE)?
            .iter()
            .map(|(_, bytes)| codec::decode(bytes))
            .collect()
    }
}
