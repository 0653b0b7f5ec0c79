//! Named propagation scenarios.
//!
//! Each scenario wires the services with a particular set of transaction
//! boundaries on a fresh harness, runs one call, and checks which records
//! survived and which error was returned.

use crate::fixtures::TestHarness;
use serde::Serialize;
use txprop_services::{
    Order, PayStatus, ServiceError, ServiceResult, TransactionBoundaries, LOG_FAILURE_MARKER,
    LOG_TABLE, MEMBER_TABLE, ORDER_TABLE, USERNAME_NOT_ENOUGH_MONEY, USERNAME_SYSTEM_FAILURE,
};

/// Which member service entry point a scenario calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinVersion {
    /// Errors propagate.
    V1,
    /// Log failures are caught by the service.
    V2,
}

/// The error a scenario expects from its call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExpectedError {
    /// The call succeeds.
    None,
    /// A runtime failure.
    Runtime,
    /// The coordinator's unexpected rollback.
    UnexpectedRollback,
    /// A business rule violation.
    BusinessRule,
}

impl ExpectedError {
    fn classify<T>(result: &ServiceResult<T>) -> Self {
        match result {
            Ok(_) => Self::None,
            Err(err) if err.is_unexpected_rollback() => Self::UnexpectedRollback,
            Err(ServiceError::BusinessRuleViolation(_)) => Self::BusinessRule,
            Err(_) => Self::Runtime,
        }
    }
}

/// What a scenario does.
#[derive(Debug, Clone)]
pub enum ScenarioKind {
    /// Join a member through the member service.
    Member {
        /// Transaction boundaries of the service and repositories.
        boundaries: TransactionBoundaries,
        /// Whether the log save fails.
        log_fails: bool,
        /// Entry point.
        version: JoinVersion,
        /// Whether the member must be stored afterwards.
        expect_member: bool,
        /// Whether the log entry must be stored afterwards.
        expect_log: bool,
    },
    /// Place an order through the order service.
    Order {
        /// Ordering customer.
        username: &'static str,
        /// Expected stored payment state, `None` if the order must be absent.
        expect_status: Option<PayStatus>,
    },
}

/// A named scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Unique name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// What to run.
    pub kind: ScenarioKind,
    /// Expected error.
    pub expect_error: ExpectedError,
}

/// One checked record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordCheck {
    /// Table name.
    pub table: &'static str,
    /// Row key.
    pub key: String,
    /// Whether the row must exist.
    pub expected: bool,
    /// Whether the row exists.
    pub present: bool,
}

/// Outcome of running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Scenario name.
    pub name: &'static str,
    /// Scenario description.
    pub description: &'static str,
    /// Error returned by the call, rendered.
    pub error: Option<String>,
    /// Expected error class.
    pub expected_error: ExpectedError,
    /// Actual error class.
    pub actual_error: ExpectedError,
    /// Record checks.
    pub records: Vec<RecordCheck>,
    /// Physical transactions opened.
    pub opened: u64,
    /// Physical commits.
    pub committed: u64,
    /// Physical rollbacks.
    pub rolled_back: u64,
    /// Whether every expectation held.
    pub passed: bool,
}

impl Scenario {
    /// Runs the scenario on a fresh harness.
    pub fn run(&self) -> ScenarioReport {
        let harness = TestHarness::new();
        let (result, records) = match &self.kind {
            ScenarioKind::Member {
                boundaries,
                log_fails,
                version,
                expect_member,
                expect_log,
            } => {
                let username = if *log_fails {
                    format!("{LOG_FAILURE_MARKER}_{}", self.name)
                } else {
                    self.name.to_string()
                };
                let service = harness.member_service(*boundaries);
                let mut session = harness.session();
                let result = match version {
                    JoinVersion::V1 => service.join_v1(&mut session, &username),
                    JoinVersion::V2 => service.join_v2(&mut session, &username),
                };
                let records = vec![
                    check(&harness, MEMBER_TABLE, &username, *expect_member),
                    check(&harness, LOG_TABLE, &username, *expect_log),
                ];
                (result, records)
            }
            ScenarioKind::Order {
                username,
                expect_status,
            } => {
                let service = harness.order_service();
                let mut session = harness.session();
                let mut order = Order::new(*username);
                let result = service.order(&mut session, &mut order);

                // A stored order only counts when its payment state matches.
                let present = match (service.orders().find_by_id(&order.id), expect_status) {
                    (Ok(Some(found)), Some(status)) => found.pay_status == Some(*status),
                    (Ok(Some(_)), None) => true,
                    _ => false,
                };
                let records = vec![RecordCheck {
                    table: ORDER_TABLE,
                    key: order.id.to_string(),
                    expected: expect_status.is_some(),
                    present,
                }];
                (result, records)
            }
        };

        let actual_error = ExpectedError::classify(&result);
        let physical = harness.physical();
        let passed = actual_error == self.expect_error
            && records.iter().all(|r| r.expected == r.present)
            && harness.backend.open_count() == 0;

        ScenarioReport {
            name: self.name,
            description: self.description,
            error: result.err().map(|e| e.to_string()),
            expected_error: self.expect_error,
            actual_error,
            records,
            opened: physical.opened,
            committed: physical.committed,
            rolled_back: physical.rolled_back,
            passed,
        }
    }
}

fn check(harness: &TestHarness, table: &'static str, key: &str, expected: bool) -> RecordCheck {
    let present = harness
        .coordinator
        .read_committed(table, key)
        .map(|row| row.is_some())
        .unwrap_or(false);
    RecordCheck {
        table,
        key: key.to_string(),
        expected,
        present,
    }
}

/// Returns every named scenario.
pub fn catalogue() -> Vec<Scenario> {
    use txprop_core::Propagation;

    let member = |name, description, boundaries, log_fails, version, m, l, err| Scenario {
        name,
        description,
        kind: ScenarioKind::Member {
            boundaries,
            log_fails,
            version,
            expect_member: m,
            expect_log: l,
        },
        expect_error: err,
    };
    let order = |name, description, username, status, err| Scenario {
        name,
        description,
        kind: ScenarioKind::Order {
            username,
            expect_status: status,
        },
        expect_error: err,
    };

    vec![
        member(
            "outer_tx_off_success",
            "no service transaction; member and log commit independently",
            TransactionBoundaries::outer_off(),
            false,
            JoinVersion::V1,
            true,
            true,
            ExpectedError::None,
        ),
        member(
            "outer_tx_off_fail",
            "no service transaction; log fails in its own transaction, member stays",
            TransactionBoundaries::outer_off(),
            true,
            JoinVersion::V1,
            true,
            false,
            ExpectedError::Runtime,
        ),
        member(
            "single_tx",
            "service transaction only; repositories run inside it",
            TransactionBoundaries::single(),
            false,
            JoinVersion::V1,
            true,
            true,
            ExpectedError::None,
        ),
        member(
            "outer_tx_on_success",
            "service and repositories REQUIRED; one physical commit",
            TransactionBoundaries::outer_on(),
            false,
            JoinVersion::V1,
            true,
            true,
            ExpectedError::None,
        ),
        member(
            "outer_tx_on_fail",
            "service and repositories REQUIRED; log failure propagates and rolls back everything",
            TransactionBoundaries::outer_on(),
            true,
            JoinVersion::V1,
            false,
            false,
            ExpectedError::Runtime,
        ),
        member(
            "recover_exception_fail",
            "log failure caught by the service, but the shared transaction is already rollback-only",
            TransactionBoundaries::outer_on(),
            true,
            JoinVersion::V2,
            false,
            false,
            ExpectedError::UnexpectedRollback,
        ),
        member(
            "recover_exception_success",
            "log runs REQUIRES_NEW; its rollback is isolated and the member commits",
            TransactionBoundaries::log_requires_new(),
            true,
            JoinVersion::V2,
            true,
            false,
            ExpectedError::None,
        ),
        member(
            "recover_exception_nested",
            "log runs NESTED; its savepoint rolls back and the member commits",
            TransactionBoundaries {
                service: Some(Propagation::Required),
                member_repository: Some(Propagation::Required),
                log_repository: Some(Propagation::Nested),
            },
            true,
            JoinVersion::V2,
            true,
            false,
            ExpectedError::None,
        ),
        order(
            "order_complete",
            "payment succeeds; order stored as complete",
            "normal",
            Some(PayStatus::Complete),
            ExpectedError::None,
        ),
        order(
            "order_runtime_exception",
            "system failure during payment; order rolled back",
            USERNAME_SYSTEM_FAILURE,
            None,
            ExpectedError::Runtime,
        ),
        order(
            "order_business_exception",
            "not enough money; order committed as pending and the error returned",
            USERNAME_NOT_ENOUGH_MONEY,
            Some(PayStatus::Pending),
            ExpectedError::BusinessRule,
        ),
    ]
}

/// Looks up a scenario by name.
pub fn find_scenario(name: &str) -> Option<Scenario> {
    catalogue().into_iter().find(|s| s.name == name)
}

/// Runs every scenario.
pub fn run_all() -> Vec<ScenarioReport> {
    catalogue().iter().map(Scenario::run).collect()
}
