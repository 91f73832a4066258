//! Auth container: credentials form, sign-up/sign-in lifecycle, session flag

use crate::session::SessionStore;
use serde::{Deserialize, Serialize};
use soundwave_core::{async_effect, effect::Effect, reducer::Reducer, smallvec, SmallVec};

/// Whether the user is known to be signed in
///
/// Serializes as `null` / `true` / `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// Not checked yet
    #[default]
    Unknown,
    /// A session is established
    Authenticated,
    /// Checked, and there is no session
    Unauthenticated,
}

impl AuthStatus {
    /// Nullable boolean view
    #[must_use]
    pub const fn as_option(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Authenticated => Some(true),
            Self::Unauthenticated => Some(false),
        }
    }
}

impl Serialize for AuthStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_option().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AuthStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            None => Self::Unknown,
            Some(true) => Self::Authenticated,
            Some(false) => Self::Unauthenticated,
        })
    }
}

/// Signed-in user as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// User id
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// Successful sign-up/sign-in response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthPayload {
    /// Signed-in user
    pub user: UserProfile,
    /// Bearer token for subsequent requests
    pub token: String,
}

/// Auth slice of the application state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthState {
    /// Last successful auth response
    pub auth: Option<AuthPayload>,
    /// Email typed into the form
    pub input_email: String,
    /// Password typed into the form
    pub input_password: String,
    /// Name typed into the sign-up form
    pub input_name: String,
    /// A sign-up or sign-in is in flight
    pub is_loading: bool,
    /// The last attempt failed
    pub is_error: bool,
    /// The last attempt succeeded
    pub is_success: bool,
    /// Whether the user is signed in
    pub is_auth: AuthStatus,
    /// Message of the last failure
    pub error_msg: String,
    /// Current bearer token
    pub token: Option<String>,
}

impl AuthState {
    fn begin(&mut self) {
        self.is_loading = true;
    }

    fn succeed(&mut self, payload: AuthPayload) {
        self.is_loading = false;
        self.is_error = false;
        self.is_success = true;
        self.error_msg.clear();
        self.token = Some(payload.token.clone());
        self.auth = Some(payload);
        self.is_auth = AuthStatus::Authenticated;
    }

    fn fail(&mut self, message: String) {
        self.is_loading = false;
        self.is_success = false;
        self.is_error = true;
        self.error_msg = message;
    }

    fn reset(&mut self) {
        self.is_loading = false;
        self.is_error = false;
        self.is_success = false;
        self.error_msg.clear();
    }
}

/// Auth intents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthAction {
    /// Store the form fields
    SetUserData {
        /// Email
        email: String,
        /// Password
        password: String,
        /// Name (sign-up only)
        name: String,
    },
    /// Start a sign-up with the stored form fields
    SignUpRequest,
    /// Sign-up succeeded
    SignUpSuccess(AuthPayload),
    /// Sign-up failed
    SignUpFailure(String),
    /// Start a sign-in with the stored form fields
    SignInRequest,
    /// Sign-in succeeded
    SignInSuccess(AuthPayload),
    /// Sign-in failed
    SignInFailure(String),
    /// Ask for the user to be signed out
    SignOutRequest,
    /// Drop the session
    SignOut,
    /// Restore the persisted session
    SetUser,
    /// A persisted session was found
    SetIsAuth {
        /// Token from the persisted session
        token: String,
    },
    /// No persisted session was found
    SetUnauthenticated,
    /// Neutralize the transient flags
    Reset,
}

/// Dependencies of the auth container
#[derive(Debug, Clone)]
pub struct AuthEnvironment {
    /// Persisted session
    pub session: SessionStore,
}

impl AuthEnvironment {
    /// Create an environment
    #[must_use]
    pub const fn new(session: SessionStore) -> Self {
        Self { session }
    }
}

/// Reducer for [`AuthState`]
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthReducer;

impl AuthReducer {
    fn forget(env: &AuthEnvironment) -> Effect<AuthAction> {
        let session = env.session.clone();
        async_effect! {
            if let Err(error) = session.clear() {
                tracing::error!(%error, "Failed to clear session");
            }
            None::<AuthAction>
        }
    }
}

impl Reducer for AuthReducer {
    type State = AuthState;
    type Action = AuthAction;
    type Environment = AuthEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            AuthAction::SetUserData { email, password, name } => {
                state.input_email = email;
                state.input_password = password;
                state.input_name = name;
            },
            AuthAction::SignUpRequest | AuthAction::SignInRequest => state.begin(),
            // The routine has already persisted the session
            AuthAction::SignUpSuccess(payload) | AuthAction::SignInSuccess(payload) => {
                state.succeed(payload);
            },
            AuthAction::SignUpFailure(message) | AuthAction::SignInFailure(message) => {
                state.fail(message);
            },
            AuthAction::SignOut => {
                state.auth = None;
                state.token = None;
                state.is_auth = AuthStatus::Unauthenticated;
                return smallvec![Self::forget(env)];
            },
            AuthAction::SetIsAuth { token } => {
                state.token = Some(token);
                state.is_auth = AuthStatus::Authenticated;
            },
            AuthAction::SetUnauthenticated => {
                state.is_auth = AuthStatus::Unauthenticated;
            },
            AuthAction::Reset => state.reset(),
            // Triggers for effect routines
            AuthAction::SignOutRequest | AuthAction::SetUser => {},
        }

        smallvec![Effect::None]
    }
}
