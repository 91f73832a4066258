//! Counter container

use serde::{Deserialize, Serialize};
use soundwave_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// Counter slice of the application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CounterState {
    /// Current value
    pub value: i64,
}

/// Counter intents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterAction {
    /// Add one
    Increment,
    /// Subtract one
    Decrement,
    /// Add an arbitrary amount
    IncrementByAmount(i64),
    /// Back to zero
    Reset,
}

/// Reducer for [`CounterState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterReducer;

impl Reducer for CounterReducer {
    type State = CounterState;
    type Action = CounterAction;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            CounterAction::Increment => state.value = state.value.saturating_add(1),
            CounterAction::Decrement => state.value = state.value.saturating_sub(1),
            CounterAction::IncrementByAmount(amount) => state.value = state.value.saturating_add(amount),
            CounterAction::Reset => state.value = 0,
        }

        smallvec![Effect::None]
    }
}
