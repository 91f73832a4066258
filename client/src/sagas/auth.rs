//! Session routines: restore, sign-up, sign-in, sign-out

use super::{AppContext, Backend};
use crate::app::{AppAction, AppState};
use crate::auth::{AuthAction, AuthPayload};
use crate::song::SongAction;
use async_trait::async_trait;
use serde_json::json;
use soundwave_http::{Method, FALLBACK_MESSAGE};
use soundwave_runtime::Saga;
use std::sync::Arc;

/// Restores the persisted session on `SetUser`
#[derive(Debug, Clone)]
pub struct SetUser {
    backend: Arc<Backend>,
}

impl SetUser {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for SetUser {
    fn name(&self) -> &'static str {
        "set_user"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Auth(AuthAction::SetUser))
    }

    async fn handle(&self, _action: AppAction, _ctx: &AppContext) -> Option<AppAction> {
        let token = self
            .backend
            .session()
            .read()
            .filter(|session| session.is_authenticated)
            .and_then(|session| session.token);

        Some(match token {
            Some(token) => AuthAction::SetIsAuth { token },
            None => AuthAction::SetUnauthenticated,
        }
        .into())
    }

    fn on_crash(&self) -> Option<AppAction> {
        Some(AuthAction::SetUnauthenticated.into())
    }
}

/// Signs up with the form fields on `SignUpRequest`
///
/// The session is written before the success intent is dispatched, so a
/// request sent in reaction to it already carries the token.
#[derive(Debug, Clone)]
pub struct SignUp {
    backend: Arc<Backend>,
}

impl SignUp {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for SignUp {
    fn name(&self) -> &'static str {
        "sign_up"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Auth(AuthAction::SignUpRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let body = ctx
            .select(|s| {
                json!({
                    "name": s.auth.input_name,
                    "email": s.auth.input_email,
                    "password": s.auth.input_password,
                })
            })
            .await;

        let result = self
            .backend
            .call::<AuthPayload>(Method::Post, "/auth/signup", Some(body))
            .await;

        Some(
            match result {
                Ok(payload) => {
                    self.backend.establish(&payload);
                    AuthAction::SignUpSuccess(payload)
                },
                Err(message) => AuthAction::SignUpFailure(message),
            }
            .into(),
        )
    }

    fn on_crash(&self) -> Option<AppAction> {
        Some(AuthAction::SignUpFailure(FALLBACK_MESSAGE.to_string()).into())
    }
}

/// Signs in with the form fields on `SignInRequest`, persisting the session first
#[derive(Debug, Clone)]
pub struct SignIn {
    backend: Arc<Backend>,
}

impl SignIn {
    /// Create the routine
    #[must_use]
    pub const fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Saga<AppState, AppAction> for SignIn {
    fn name(&self) -> &'static str {
        "sign_in"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Auth(AuthAction::SignInRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        let body = ctx
            .select(|s| {
                json!({
                    "email": s.auth.input_email,
                    "password": s.auth.input_password,
                })
            })
            .await;

        let result = self
            .backend
            .call::<AuthPayload>(Method::Post, "/auth/signin", Some(body))
            .await;

        Some(
            match result {
                Ok(payload) => {
                    self.backend.establish(&payload);
                    AuthAction::SignInSuccess(payload)
                },
                Err(message) => AuthAction::SignInFailure(message),
            }
            .into(),
        )
    }

    fn on_crash(&self) -> Option<AppAction> {
        Some(AuthAction::SignInFailure(FALLBACK_MESSAGE.to_string()).into())
    }
}

/// Turns `SignOutRequest` into `SignOut` and drops the user's song data
#[derive(Debug, Clone, Copy)]
pub struct SignOut;

#[async_trait]
impl Saga<AppState, AppAction> for SignOut {
    fn name(&self) -> &'static str {
        "sign_out"
    }

    fn trigger(&self, action: &AppAction) -> bool {
        matches!(action, AppAction::Auth(AuthAction::SignOutRequest))
    }

    async fn handle(&self, _action: AppAction, ctx: &AppContext) -> Option<AppAction> {
        ctx.put(AuthAction::SignOut.into()).await;
        Some(SongAction::ClearUserData.into())
    }
}
