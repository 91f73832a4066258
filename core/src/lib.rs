//! # Soundwave Core
//!
//! Core traits and types for the Soundwave client state layer.
//!
//! This crate provides the abstractions every state container is written
//! against. It has no I/O of its own.
//!
//! ## Core Concepts
//!
//! - **State**: The slice of application state a container owns
//! - **Action**: Every intent a container reacts to (requests, terminal results, setters)
//! - **Reducer**: Pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: Side effect descriptions, executed later by the runtime
//! - **Environment**: Injected dependencies (session store, clients)
//!
//! ## Example
//!
//! ```
//! use soundwave_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//!
//! #[derive(Clone, Debug, Default)]
//! struct PlayerState {
//!     volume: u8,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum PlayerAction {
//!     SetVolume(u8),
//! }
//!
//! struct PlayerReducer;
//!
//! impl Reducer for PlayerReducer {
//!     type State = PlayerState;
//!     type Action = PlayerAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut PlayerState,
//!         action: PlayerAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<PlayerAction>; 4]> {
//!         match action {
//!             PlayerAction::SetVolume(volume) => state.volume = volume,
//!         }
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! let mut state = PlayerState::default();
//! let _ = PlayerReducer.reduce(&mut state, PlayerAction::SetVolume(7), &());
//! assert_eq!(state.volume, 7);
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Reducer composition utilities
pub mod composition;

/// Declarative macros for effect construction
pub mod effect_macros;

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`.
/// Given the same state and action they always produce the same state; any
/// I/O they need is returned as an [`Effect`](crate::effect::Effect) value.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for a state container
    ///
    /// # Type Parameters
    ///
    /// - `State`: The slice of state this reducer owns
    /// - `Action`: The intent type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for AuthReducer {
    ///     type State = AuthState;
    ///     type Action = AuthAction;
    ///     type Environment = AuthEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut AuthState,
    ///         action: AuthAction,
    ///         env: &AuthEnvironment,
    ///     ) -> SmallVec<[Effect<AuthAction>; 4]> {
    ///         match action {
    ///             AuthAction::SignInRequest => {
    ///                 state.is_loading = true;
    ///                 smallvec![Effect::None]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// Updates state in place and returns effect descriptions for the
        /// runtime to execute. Must not perform I/O itself.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Boxed future produced by an [`Effect::Future`]
    pub type EffectFuture<Action> = Pin<Box<dyn Future<Output = Option<Action>> + Send>>;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(EffectFuture<Action>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Whether this effect does nothing when executed
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }

        /// Transform the actions this effect feeds back
        ///
        /// Used to embed a child container's effects into a parent action type.
        #[must_use]
        pub fn map<B>(self, f: fn(Action) -> B) -> Effect<B>
        where
            Action: Send + 'static,
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Future(fut) => Effect::Future(Box::pin(async move { fut.await.map(f) })),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;

    #[derive(Clone, Debug, PartialEq)]
    enum Child {
        Ping,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Parent {
        Child(Child),
    }

    #[test]
    fn test_is_none() {
        assert!(Effect::<Child>::None.is_none());
        assert!(!Effect::Future(Box::pin(async { Some(Child::Ping) })).is_none());
        assert!(Effect::<Child>::None.map(Parent::Child).is_none());
    }

    #[tokio::test]
    #[allow(clippy::panic)] // Test code can panic
    async fn test_map_future() {
        let effect = Effect::Future(Box::pin(async { Some(Child::Ping) })).map(Parent::Child);

        let Effect::Future(fut) = effect else {
            panic!("expected a future effect");
        };
        assert_eq!(fut.await, Some(Parent::Child(Child::Ping)));
    }
}
