//! Effect routines, one per workflow
//!
//! Each routine waits for its request intent, reads the state it needs,
//! calls the API and answers with exactly one terminal intent. Failures are
//! turned into messages here; only strings reach state.

mod auth;
mod favorites;
mod songs;

pub use auth::{SetUser, SignIn, SignOut, SignUp};
pub use favorites::{AddFav, GetFavs, RemoveFav, ToggleFavorite};
pub use songs::{AddSong, DeleteSong, EditSong, GetByGenre, GetLib, GetMySongs, GetRecent, Search, SearchForAdd};

use crate::app::{AppAction, AppState};
use crate::auth::{AuthAction, AuthPayload};
use crate::session::{Session, SessionStore};
use crate::song::SongAction;
use serde::de::DeserializeOwned;
use serde_json::Value;
use soundwave_http::{ApiClient, HttpError, Method};
use soundwave_runtime::{Saga, SagaContext};
use std::sync::Arc;

/// Context handed to every routine handler
pub type AppContext = SagaContext<AppState, AppAction>;

/// What routines share: the API client and the session
#[derive(Debug, Clone)]
pub struct Backend {
    api: ApiClient,
    session: SessionStore,
    sign_out_on_unauthorized: bool,
}

impl Backend {
    /// Create a backend
    #[must_use]
    pub const fn new(api: ApiClient, session: SessionStore, sign_out_on_unauthorized: bool) -> Self {
        Self {
            api,
            session,
            sign_out_on_unauthorized,
        }
    }

    /// The persisted session
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Persist a fresh session
    fn establish(&self, payload: &AuthPayload) {
        if let Err(error) = self.session.write(&Session::authenticated(payload.token.clone())) {
            tracing::error!(%error, "Failed to persist session");
        }
    }

    /// Call an unauthenticated endpoint and decode the body
    async fn call<T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<Value>) -> Result<T, String> {
        self.api
            .request(method, path, body, None)
            .await
            .and_then(|response| response.json::<T>())
            .map_err(|error| error.user_message())
    }

    /// Call an endpoint that requires the session
    ///
    /// A 401 also signs the user out and drops their song data, unless that
    /// policy is disabled.
    async fn call_authenticated<T: DeserializeOwned>(
        &self,
        ctx: &AppContext,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, String> {
        match self.api.request(method, path, body, None).await {
            Ok(response) => response.json::<T>().map_err(|error| error.user_message()),
            Err(error) => Err(self.reject(ctx, &error).await),
        }
    }

    async fn reject(&self, ctx: &AppContext, error: &HttpError) -> String {
        if error.is_unauthorized() && self.sign_out_on_unauthorized {
            tracing::info!("Session rejected by the API, signing out");
            metrics::counter!("client.session.rejected").increment(1);
            ctx.put(AuthAction::SignOut.into()).await;
            ctx.put(SongAction::ClearUserData.into()).await;
        }
        error.user_message()
    }
}

fn routine(saga: impl Saga<AppState, AppAction>) -> Arc<dyn Saga<AppState, AppAction>> {
    Arc::new(saga)
}

/// Every routine the client runs
#[must_use]
pub fn all(backend: &Arc<Backend>) -> Vec<Arc<dyn Saga<AppState, AppAction>>> {
    vec![
        routine(SetUser::new(Arc::clone(backend))),
        routine(SignUp::new(Arc::clone(backend))),
        routine(SignIn::new(Arc::clone(backend))),
        routine(SignOut),
        routine(AddSong::new(Arc::clone(backend))),
        routine(EditSong::new(Arc::clone(backend))),
        routine(DeleteSong::new(Arc::clone(backend))),
        routine(GetRecent::new(Arc::clone(backend))),
        routine(GetByGenre::new(Arc::clone(backend))),
        routine(GetLib::new(Arc::clone(backend))),
        routine(GetMySongs::new(Arc::clone(backend))),
        routine(Search::new(Arc::clone(backend))),
        routine(SearchForAdd::new(Arc::clone(backend))),
        routine(ToggleFavorite),
        routine(AddFav::new(Arc::clone(backend))),
        routine(RemoveFav::new(Arc::clone(backend))),
        routine(GetFavs::new(Arc::clone(backend))),
    ]
}
