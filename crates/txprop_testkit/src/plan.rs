//! Call plans.
//!
//! A [`Call`] is a tree of units of work. Executing it begins each node
//! with its propagation, stages one write per node, runs the children
//! (swallowing their errors, as a caller that recovers would), and
//! completes the node with its own outcome. [`expected_rows`] computes
//! which writes must survive without touching the coordinator.
//!
//! A plan root should not use `Mandatory`: with no current transaction
//! its begin fails before anything is written.

use txprop_core::{Outcome, Propagation, Session, TxError, TxResult};

/// Table written by executed plans.
pub const PLAN_TABLE: &str = "plan";

/// One unit of work in a call plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Propagation used to begin this unit.
    pub propagation: Propagation,
    /// Whether this unit completes with `Failure`.
    pub fails: bool,
    /// Units called from inside this one, in order.
    pub children: Vec<Call>,
}

impl Call {
    /// Creates a call without children.
    pub fn leaf(propagation: Propagation, fails: bool) -> Self {
        Self {
            propagation,
            fails,
            children: Vec::new(),
        }
    }

    /// Creates a call with children.
    pub fn with_children(propagation: Propagation, fails: bool, children: Vec<Call>) -> Self {
        Self {
            propagation,
            fails,
            children,
        }
    }

    /// Returns the number of units in the tree.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(Call::len).sum::<usize>()
    }

    /// Returns false; a plan always has a root.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns the number of units that start their own physical
    /// transaction, assuming the root runs with no current transaction.
    /// Below the root only `RequiresNew` units do; `Nested` units create
    /// savepoints.
    pub fn physical_count(&self) -> usize {
        1 + self.children.iter().map(Call::owner_count).sum::<usize>()
    }

    fn owner_count(&self) -> usize {
        let own = usize::from(self.propagation == Propagation::RequiresNew);
        own + self.children.iter().map(Call::owner_count).sum::<usize>()
    }
}

/// Row key written by the unit with the given preorder index.
pub fn row_key(index: usize) -> String {
    format!("unit-{index:04}")
}

/// Result of executing a plan.
#[derive(Debug)]
pub struct PlanRun {
    /// Result of completing the root unit.
    pub root: TxResult<()>,
    /// Number of child completions that returned an error.
    pub swallowed_errors: usize,
}

impl PlanRun {
    /// Returns true if the root reported an unexpected rollback.
    pub fn root_unexpected_rollback(&self) -> bool {
        matches!(self.root, Err(TxError::UnexpectedRollback { .. }))
    }
}

/// Executes a plan on a session.
pub fn execute_plan(session: &mut Session, call: &Call) -> PlanRun {
    let mut next_index = 0;
    let mut swallowed_errors = 0;
    let root = run_call(session, call, &mut next_index, &mut swallowed_errors);
    PlanRun {
        root,
        swallowed_errors,
    }
}

fn run_call(
    session: &mut Session,
    call: &Call,
    next_index: &mut usize,
    swallowed: &mut usize,
) -> TxResult<()> {
    let ctx = session.begin(call.propagation)?;
    let key = row_key(*next_index);
    *next_index += 1;
    session.put(&ctx, PLAN_TABLE, &key, key.as_bytes().to_vec())?;

    for child in &call.children {
        if run_call(session, child, next_index, swallowed).is_err() {
            *swallowed += 1;
        }
    }

    let outcome = if call.fails {
        Outcome::Failure
    } else {
        Outcome::Success
    };
    session.complete(ctx, outcome).map(|_| ())
}

/// Returns, per unit in preorder, whether its write must be committed.
///
/// Units without a current transaction and `RequiresNew` units own a
/// physical transaction, which commits only if the owner succeeds and no
/// joined unit latched it rollback-only. `Required` units join and latch on
/// failure. A failing `Nested` unit discards every write staged in its
/// physical transaction since it began and restores the latch to what it
/// was then.
pub fn expected_rows(call: &Call) -> Vec<bool> {
    let mut committed = vec![false; call.len()];
    simulate(call, None, &mut 0, &mut committed);
    committed
}

/// Returns whether completing the root must raise an unexpected rollback.
pub fn expect_root_unexpected_rollback(call: &Call) -> bool {
    let mut committed = vec![false; call.len()];
    simulate(call, None, &mut 0, &mut committed)
}

/// Physical transaction state while simulating a plan.
struct ModelFrame {
    writes: Vec<usize>,
    rollback_only: bool,
}

/// Simulates one unit. Returns true if it owns a physical transaction and
/// its successful completion must report an unexpected rollback.
fn simulate(
    call: &Call,
    frame: Option<&mut ModelFrame>,
    next_index: &mut usize,
    committed: &mut [bool],
) -> bool {
    let index = *next_index;
    *next_index += 1;

    match (frame, call.propagation) {
        (Some(frame), Propagation::Required | Propagation::Mandatory) => {
            frame.writes.push(index);
            for child in &call.children {
                simulate(child, Some(&mut *frame), next_index, committed);
            }
            if call.fails {
                frame.rollback_only = true;
            }
            false
        }
        (Some(frame), Propagation::Nested) => {
            let mark = frame.writes.len();
            let latched = frame.rollback_only;
            frame.writes.push(index);
            for child in &call.children {
                simulate(child, Some(&mut *frame), next_index, committed);
            }
            if call.fails {
                frame.writes.truncate(mark);
                frame.rollback_only = latched;
            }
            false
        }
        _ => {
            let mut own = ModelFrame {
                writes: vec![index],
                rollback_only: false,
            };
            for child in &call.children {
                simulate(child, Some(&mut own), next_index, committed);
            }
            if call.fails {
                return false;
            }
            if own.rollback_only {
                return true;
            }
            for write in own.writes {
                committed[write] = true;
            }
            false
        }
    }
}
