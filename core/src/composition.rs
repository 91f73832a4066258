//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers:
//! - **`scope_reducer`**: Lift a container's reducer into the application's
//!   state, action and environment types
//! - **`combine_reducers`**: Run several reducers over the same state/action
//!
//! Together they build the root reducer out of independent containers:
//!
//! ```
//! use soundwave_core::composition::{combine_reducers, scope_reducer, Scope};
//! use soundwave_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct VolumeState {
//!     level: u8,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum VolumeAction {
//!     Up,
//! }
//!
//! struct VolumeReducer;
//!
//! impl Reducer for VolumeReducer {
//!     type State = VolumeState;
//!     type Action = VolumeAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut VolumeState, _action: VolumeAction, _env: &()) -> SmallVec<[Effect<VolumeAction>; 4]> {
//!         state.level += 1;
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! #[derive(Clone, Debug, Default)]
//! struct AppState {
//!     volume: VolumeState,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum AppAction {
//!     Volume(VolumeAction),
//! }
//!
//! let root = combine_reducers(vec![Box::new(scope_reducer(
//!     VolumeReducer,
//!     Scope {
//!         state: |s: &mut AppState| &mut s.volume,
//!         extract: |a: AppAction| match a {
//!             AppAction::Volume(a) => Some(a),
//!         },
//!         embed: AppAction::Volume,
//!         environment: |e: &()| e,
//!     },
//! ))]);
//!
//! let mut state = AppState::default();
//! let _ = root.reduce(&mut state, AppAction::Volume(VolumeAction::Up), &());
//! assert_eq!(state.volume.level, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Boxed reducer that can be shared across tasks
pub type BoxedReducer<S, A, E> = Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in sequence, and all effects are collected and concatenated.
///
/// # Type Parameters
///
/// - `S`: The state type
/// - `A`: The action type
/// - `E`: The environment type
#[must_use]
pub fn combine_reducers<S, A, E>(reducers: Vec<BoxedReducer<S, A, E>>) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<BoxedReducer<S, A, E>>,
}

impl<S, A, E> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    /// Number of reducers combined
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether no reducers were combined
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            let effects = reducer.reduce(state, action.clone(), env);
            all_effects.extend(effects);
        }

        all_effects
    }
}

/// Lenses focusing a parent (state, action, environment) triple on a child.
///
/// - `state` borrows the child slice out of the parent state
/// - `extract` returns the child action when the parent action targets this child
/// - `embed` wraps child actions fed back by effects
/// - `environment` borrows the child's dependencies
pub struct Scope<S, SubS, A, SubA, E, SubE> {
    /// Focus parent state on the child slice
    pub state: fn(&mut S) -> &mut SubS,
    /// Child action carried by a parent action, if any
    pub extract: fn(A) -> Option<SubA>,
    /// Wrap a child action into the parent action type
    pub embed: fn(SubA) -> A,
    /// Focus parent environment on the child environment
    pub environment: fn(&E) -> &SubE,
}

/// Scopes a reducer to operate on a subset of a larger state.
///
/// Parent actions that do not target the child are ignored; child effects are
/// mapped back into parent actions with `scope.embed`.
#[must_use]
pub fn scope_reducer<S, SubS, A, SubA, E, SubE, R>(
    reducer: R,
    scope: Scope<S, SubS, A, SubA, E, SubE>,
) -> ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
    SubA: Send + 'static,
    A: Send + 'static,
{
    ScopedReducer { reducer, scope }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
{
    reducer: R,
    scope: Scope<S, SubS, A, SubA, E, SubE>,
}

impl<S, SubS, A, SubA, E, SubE, R> Reducer for ScopedReducer<S, SubS, A, SubA, E, SubE, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = SubE>,
    SubA: Send + 'static,
    A: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let Some(child_action) = (self.scope.extract)(action) else {
            return SmallVec::new();
        };

        let child_state = (self.scope.state)(state);
        let child_env = (self.scope.environment)(env);

        self.reducer
            .reduce(child_state, child_action, child_env)
            .into_iter()
            .map(|effect| effect.map(self.scope.embed))
            .collect()
    }
}
