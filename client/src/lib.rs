//! # Soundwave
//!
//! Client-side state orchestration for the Soundwave music app.
//!
//! The client owns one [`Store`](soundwave_runtime::Store) holding three
//! containers (auth, song, counter) and one supervised effect routine per
//! workflow. The presentation layer dispatches request and setter intents and
//! reads state; routines call the API and answer with terminal intents.
//!
//! ## Example
//!
//! ```no_run
//! use soundwave::auth::AuthAction;
//! use soundwave::config::ClientConfig;
//! use soundwave::SoundwaveClient;
//!
//! # async fn run() -> Result<(), soundwave::ClientError> {
//! let client = SoundwaveClient::connect(&ClientConfig::from_env()?).await?;
//!
//! client
//!     .dispatch(AuthAction::SetUserData {
//!         email: "ada@example.com".into(),
//!         password: "hunter2".into(),
//!         name: String::new(),
//!     })
//!     .await?;
//! client.dispatch(AuthAction::SignInRequest).await?;
//!
//! client.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod counter;
pub mod sagas;
pub mod session;
pub mod song;
pub mod telemetry;

pub use app::{app_reducer, AppAction, AppEnvironment, AppReducer, AppState, AppStore};
pub use config::{ClientConfig, ConfigError};
pub use session::{FileStorage, MemoryStorage, Session, SessionStorage, SessionStore, StorageError};

use auth::AuthAction;
use sagas::Backend;
use soundwave_http::{ApiClient, HttpError, ReqwestTransport, Transport};
use soundwave_runtime::{Coordinator, CoordinatorConfig, EffectHandle, HealthReport, StoreConfig, StoreError};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while starting or driving the client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session file could not be opened
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The HTTP transport could not be built
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The store rejected an intent
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A running client: store, routines and session
pub struct SoundwaveClient {
    store: AppStore,
    coordinator: Coordinator,
    session: SessionStore,
}

impl SoundwaveClient {
    /// Build the reqwest transport and session storage from `config`, then start
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the configuration is invalid, the session
    /// file cannot be opened or the HTTP client cannot be built.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let session = match &config.session_path {
            Some(path) => SessionStore::new(Arc::new(FileStorage::open(path)?)),
            None => SessionStore::in_memory(),
        };
        let transport = ReqwestTransport::new(config.api_url.clone(), config.request_timeout)?;

        Self::start(config, Arc::new(transport), session).await
    }

    /// Start over an explicit transport and session store
    ///
    /// Routines are subscribed before the session restore intent is sent.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Store`] if the restore intent cannot be sent.
    #[tracing::instrument(skip_all, name = "client_start")]
    pub async fn start(
        config: &ClientConfig,
        transport: Arc<dyn Transport>,
        session: SessionStore,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::with_credentials(transport, Arc::new(session.clone()));
        let backend = Arc::new(Backend::new(api, session.clone(), config.sign_out_on_unauthorized));

        let store = AppStore::with_config(
            AppState::default(),
            app_reducer(),
            AppEnvironment::new(session.clone()),
            StoreConfig::default().with_broadcast_capacity(config.broadcast_capacity),
        );
        let coordinator = Coordinator::start(
            &store,
            sagas::all(&backend),
            CoordinatorConfig::default().with_max_restarts(config.max_restarts),
        );

        store.send(AuthAction::SetUser.into()).await?;
        tracing::info!(routines = coordinator.len(), "Client started");

        Ok(Self {
            store,
            coordinator,
            session,
        })
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &AppStore {
        &self.store
    }

    /// The persisted session
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Dispatch an intent
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] once the client is shutting down.
    pub async fn dispatch(&self, action: impl Into<AppAction>) -> Result<EffectHandle, StoreError> {
        self.store.send(action.into()).await
    }

    /// Read state through a projection
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&AppState) -> T,
    {
        self.store.state(f).await
    }

    /// Store and routine health
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let mut checks = vec![self.store.health()];
        checks.extend(self.coordinator.health().checks);
        HealthReport::new(checks)
    }

    /// Stop every routine, then drain the store
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// when the store's shutdown timeout expires.
    pub async fn shutdown(mut self) -> Result<(), StoreError> {
        self.coordinator.shutdown().await;
        self.store.shutdown_default().await
    }
}

impl std::fmt::Debug for SoundwaveClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoundwaveClient")
            .field("coordinator", &self.coordinator)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
