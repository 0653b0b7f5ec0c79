//! Order service.

use crate::error::{BusinessRule, ServiceError, ServiceResult};
use crate::model::{Order, PayStatus};
use crate::repository::OrderRepository;
use std::sync::Arc;
use tracing::info;
use txprop_core::{Propagation, Session, TransactionCoordinator};

/// Customers with this name trigger a system failure during payment.
pub const USERNAME_SYSTEM_FAILURE: &str = "exception";

/// Customers with this name do not have enough money.
pub const USERNAME_NOT_ENOUGH_MONEY: &str = "insufficient";

/// Places orders and processes their payment.
///
/// An order call is one `Required` transaction:
/// - a system failure rolls the whole order back
/// - not enough money commits the order as [`PayStatus::Pending`] and
///   returns [`BusinessRule::NotEnoughMoney`] to the caller
/// - otherwise the order is committed as [`PayStatus::Complete`]
#[derive(Debug, Clone)]
pub struct OrderService {
    orders: OrderRepository,
}

impl OrderService {
    /// Creates a service whose repository joins the order transaction.
    pub fn new(coordinator: Arc<TransactionCoordinator>) -> Self {
        Self {
            orders: OrderRepository::new(coordinator, Some(Propagation::Required)),
        }
    }

    /// Returns the order repository.
    #[must_use]
    pub fn orders(&self) -> &OrderRepository {
        &self.orders
    }

    /// Places an order and settles its payment.
    pub fn order(&self, session: &mut Session, order: &mut Order) -> ServiceResult<()> {
        session.execute(Propagation::Required, |s, _| -> ServiceResult<()> {
            info!(order = %order.id, "order called");
            self.orders.save(s, order)?;

            info!("entering payment process");
            match order.username.as_str() {
                USERNAME_SYSTEM_FAILURE => {
                    info!("system exception raised");
                    Err(ServiceError::runtime("system exception"))
                }
                USERNAME_NOT_ENOUGH_MONEY => {
                    info!("business exception raised: not enough money");
                    order.pay_status = Some(PayStatus::Pending);
                    self.orders.save(s, order)?;
                    Err(ServiceError::BusinessRuleViolation(
                        BusinessRule::NotEnoughMoney,
                    ))
                }
                _ => {
                    info!("payment approved");
                    order.pay_status = Some(PayStatus::Complete);
                    self.orders.save(s, order)?;
                    Ok(())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use txprop_core::CoordinatorConfig;
    use txprop_storage::InMemoryBackend;

    fn service() -> (Arc<TransactionCoordinator>, OrderService) {
        let coordinator = Arc::new(TransactionCoordinator::new(
            Arc::new(InMemoryBackend::new()),
            CoordinatorConfig::default(),
        ));
        (coordinator.clone(), OrderService::new(coordinator))
    }

    #[test]
    fn order_completes() {
        let (coordinator, service) = service();
        let mut session = coordinator.session();
        let mut order = Order::new("normal");

        service.order(&mut session, &mut order).unwrap();

        let found = service.orders().find_by_id(&order.id).unwrap().unwrap();
        assert_eq!(found.pay_status, Some(PayStatus::Complete));
    }

    #[test]
    fn runtime_exception_rolls_back() {
        let (coordinator, service) = service();
        let mut session = coordinator.session();
        let mut order = Order::new(USERNAME_SYSTEM_FAILURE);

        let err = service.order(&mut session, &mut order).unwrap_err();

        assert!(matches!(err, ServiceError::RuntimeFailure { .. }));
        assert!(service.orders().find_by_id(&order.id).unwrap().is_none());
    }

    #[test]
    fn business_exception_commits_pending() {
        let (coordinator, service) = service();
        let mut session = coordinator.session();
        let mut order = Order::new(USERNAME_NOT_ENOUGH_MONEY);

        match service.order(&mut session, &mut order) {
            Err(ServiceError::BusinessRuleViolation(BusinessRule::NotEnoughMoney)) => {
                info!("notify the customer and ask for payment from another account");
            }
            other => panic!("expected NotEnoughMoney, got {other:?}"),
        }

        let found = service.orders().find_by_id(&order.id).unwrap().unwrap();
        assert_eq!(found.pay_status, Some(PayStatus::Pending));
    }
}
