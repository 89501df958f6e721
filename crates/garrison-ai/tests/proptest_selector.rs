//! The action selector is the thing every downstream system trusts to
//! stay inside the discrete action space no matter what state vector or
//! exploration draw it's fed.

use garrison_ai::qlearning::{Backend, Hyperparams, LinearBackend, Selector, TabularBackend};
use garrison_ai::{ACTION_COUNT, STATE_LEN};
use proptest::prelude::*;

fn finite_f32() -> impl Strategy<Value = f32> {
    (-1_000i32..1_000i32).prop_map(|v| v as f32 * 0.01)
}

fn state_vector() -> impl Strategy<Value = [f32; STATE_LEN]> {
    prop::collection::vec(finite_f32(), STATE_LEN).prop_map(|v| {
        let mut state = [0.0f32; STATE_LEN];
        state.copy_from_slice(&v);
        state
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    #[test]
    fn linear_backend_always_selects_a_valid_action(
        state in state_vector(),
        previous_action in 0u8..ACTION_COUNT as u8,
        seed in any::<u64>(),
    ) {
        let mut selector = Selector::new(Backend::Linear(LinearBackend::default()), Hyperparams::default(), seed);
        let action = selector.select(&state, previous_action);
        prop_assert!((action as usize) < ACTION_COUNT);
    }

    #[test]
    fn tabular_backend_always_selects_a_valid_action(
        state in state_vector(),
        previous_action in 0u8..ACTION_COUNT as u8,
        seed in any::<u64>(),
    ) {
        let mut selector = Selector::new(Backend::Tabular(TabularBackend::new(8)), Hyperparams::default(), seed);
        let action = selector.select(&state, previous_action);
        prop_assert!((action as usize) < ACTION_COUNT);
    }

    /// A state vector with a non-finite entry must fall back to the idle
    /// action rather than feeding NaN/inf into either backend.
    #[test]
    fn non_finite_state_falls_back_to_idle(previous_action in 0u8..ACTION_COUNT as u8, seed in any::<u64>()) {
        let mut selector = Selector::new(Backend::Linear(LinearBackend::default()), Hyperparams::default(), seed);
        let mut state = [0.0f32; STATE_LEN];
        state[3] = f32::NAN;
        let action = selector.select(&state, previous_action);
        prop_assert_eq!(action, garrison_ai::IDLE_ACTION_ID);
    }
}
