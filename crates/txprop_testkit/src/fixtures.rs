//! Test fixtures.
//!
//! Provides a harness that wires an in-memory backend, a coordinator and
//! the services on top of them.

use std::sync::Arc;
use txprop_core::{CoordinatorConfig, Session, TransactionCoordinator};
use txprop_services::{MemberService, OrderService, TransactionBoundaries};
use txprop_storage::{InMemoryBackend, StatsSnapshot};

/// A coordinator over a fresh in-memory backend.
pub struct TestHarness {
    /// The backend, kept concrete so tests can inspect and break it.
    pub backend: Arc<InMemoryBackend>,
    /// The coordinator.
    pub coordinator: Arc<TransactionCoordinator>,
}

impl TestHarness {
    /// Creates a harness with the default configuration.
    pub fn new() -> Self {
        Self::with_config(CoordinatorConfig::default())
    }

    /// Creates a harness with the given configuration.
    pub fn with_config(config: CoordinatorConfig) -> Self {
        let backend = Arc::new(InMemoryBackend::new());
        let coordinator = Arc::new(TransactionCoordinator::new(backend.clone(), config));
        Self {
            backend,
            coordinator,
        }
    }

    /// Opens a new session.
    pub fn session(&self) -> Session {
        self.coordinator.session()
    }

    /// Creates a member service with the given boundaries.
    pub fn member_service(&self, boundaries: TransactionBoundaries) -> MemberService {
        MemberService::new(self.coordinator.clone(), boundaries)
    }

    /// Creates an order service.
    pub fn order_service(&self) -> OrderService {
        OrderService::new(self.coordinator.clone())
    }

    /// Returns the backend's physical transaction counters.
    pub fn physical(&self) -> StatsSnapshot {
        self.backend.stats().snapshot()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a fresh harness.
///
/// # Example
///
/// ```rust
/// use txprop_testkit::with_harness;
/// use txprop_core::{Outcome, Propagation};
///
/// with_harness(|h| {
///     let mut session = h.session();
///     let ctx = session.begin(Propagation::Required).unwrap();
///     session.complete(ctx, Outcome::Success).unwrap();
///     assert_eq!(h.physical().committed, 1);
/// });
/// ```
pub fn with_harness<F, R>(f: F) -> R
where
    F: FnOnce(&TestHarness) -> R,
{
    let harness = TestHarness::new();
    f(&harness)
}
