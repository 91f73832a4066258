//! Root state, intents and reducer
//!
//! The three containers are scoped into [`AppState`] and combined into one
//! reducer owned by the store.

use crate::auth::{AuthAction, AuthEnvironment, AuthReducer, AuthState};
use crate::counter::{CounterAction, CounterReducer, CounterState};
use crate::session::SessionStore;
use crate::song::{SongAction, SongReducer, SongState};
use serde::{Deserialize, Serialize};
use soundwave_core::composition::{combine_reducers, scope_reducer, BoxedReducer, CombinedReducer, Scope};
use soundwave_core::reducer::Reducer;
use soundwave_runtime::Store;

/// Whole client state, one record per container
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppState {
    /// Auth container
    pub auth: AuthState,
    /// Song container
    pub song: SongState,
    /// Counter container
    pub counter: CounterState,
}

/// Every intent the client reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Auth intents
    Auth(AuthAction),
    /// Song intents
    Song(SongAction),
    /// Counter intents
    Counter(CounterAction),
}

impl From<AuthAction> for AppAction {
    fn from(action: AuthAction) -> Self {
        Self::Auth(action)
    }
}

impl From<SongAction> for AppAction {
    fn from(action: SongAction) -> Self {
        Self::Song(action)
    }
}

impl From<CounterAction> for AppAction {
    fn from(action: CounterAction) -> Self {
        Self::Counter(action)
    }
}

/// Dependencies of the root reducer
#[derive(Debug, Clone)]
pub struct AppEnvironment {
    /// Auth container dependencies
    pub auth: AuthEnvironment,
    /// Song container dependencies
    pub song: (),
    /// Counter container dependencies
    pub counter: (),
}

impl AppEnvironment {
    /// Build the environment around the session store
    #[must_use]
    pub const fn new(session: SessionStore) -> Self {
        Self {
            auth: AuthEnvironment::new(session),
            song: (),
            counter: (),
        }
    }
}

/// Root reducer type
pub type AppReducer = CombinedReducer<AppState, AppAction, AppEnvironment>;

/// Store type used by the client
pub type AppStore = Store<AppState, AppAction, AppEnvironment, AppReducer>;

fn boxed<R>(reducer: R) -> BoxedReducer<AppState, AppAction, AppEnvironment>
where
    R: Reducer<State = AppState, Action = AppAction, Environment = AppEnvironment> + Send + Sync + 'static,
{
    Box::new(reducer)
}

/// Build the root reducer
#[must_use]
pub fn app_reducer() -> AppReducer {
    combine_reducers(vec![
        boxed(scope_reducer(
            AuthReducer,
            Scope {
                state: |s: &mut AppState| &mut s.auth,
                extract: |a: AppAction| match a {
                    AppAction::Auth(a) => Some(a),
                    AppAction::Song(_) | AppAction::Counter(_) => None,
                },
                embed: AppAction::Auth,
                environment: |e: &AppEnvironment| &e.auth,
            },
        )),
        boxed(scope_reducer(
            SongReducer,
            Scope {
                state: |s: &mut AppState| &mut s.song,
                extract: |a: AppAction| match a {
                    AppAction::Song(a) => Some(a),
                    AppAction::Auth(_) | AppAction::Counter(_) => None,
                },
                embed: AppAction::Song,
                environment: |e: &AppEnvironment| &e.song,
            },
        )),
        boxed(scope_reducer(
            CounterReducer,
            Scope {
                state: |s: &mut AppState| &mut s.counter,
                extract: |a: AppAction| match a {
                    AppAction::Counter(a) => Some(a),
                    AppAction::Auth(_) | AppAction::Song(_) => None,
                },
                embed: AppAction::Counter,
                environment: |e: &AppEnvironment| &e.counter,
            },
        )),
    ])
}
