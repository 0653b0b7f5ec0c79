//! Property-based test generators using proptest.
//!
//! Provides strategies for generating call plans.

use crate::plan::Call;
use proptest::prelude::*;
use txprop_core::Propagation;

/// Strategy for the propagations a plan node may use.
pub fn propagation_strategy() -> impl Strategy<Value = Propagation> {
    prop_oneof![
        3 => Just(Propagation::Required),
        1 => Just(Propagation::RequiresNew),
        1 => Just(Propagation::Nested),
    ]
}

/// Strategy for whether a unit fails. Failures are the minority.
pub fn failure_strategy() -> impl Strategy<Value = bool> {
    prop::bool::weighted(0.25)
}

/// Strategy for plans mixing `Required`, `RequiresNew` and `Nested`.
pub fn call_strategy() -> impl Strategy<Value = Call> {
    plan_strategy(propagation_strategy().boxed())
}

/// Strategy for plans using only `Required`.
pub fn required_call_strategy() -> impl Strategy<Value = Call> {
    plan_strategy(Just(Propagation::Required).boxed())
}

fn plan_strategy(propagation: BoxedStrategy<Propagation>) -> impl Strategy<Value = Call> {
    let leaf = (propagation.clone(), failure_strategy())
        .prop_map(|(propagation, fails)| Call::leaf(propagation, fails));

    leaf.prop_recursive(4, 32, 4, move |inner| {
        (
            propagation.clone(),
            failure_strategy(),
            prop::collection::vec(inner, 0..4),
        )
            .prop_map(|(propagation, fails, children)| {
                Call::with_children(propagation, fails, children)
            })
    })
}
