//! Persisted session: the credential every request carries
//!
//! The session lives under the storage key `"auth"` in the envelope
//! `{ "state": { "token": ..., "isAuthenticated": ... }, "version": 0 }`, so a
//! session written by an earlier run is picked up by the next one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use soundwave_http::CredentialSource;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Storage key the session is kept under
pub const SESSION_KEY: &str = "auth";

/// Envelope version written with every session
pub const SESSION_VERSION: u32 = 0;

/// Errors from the persistence boundary
#[derive(Error, Debug)]
pub enum StorageError {
    /// Reading or writing the backing file failed
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded
    #[error("Session storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The authentication credential and flag
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Bearer token from the last successful sign-in or sign-up
    pub token: Option<String>,
    /// Whether the user is signed in
    #[serde(default)]
    pub is_authenticated: bool,
}

impl Session {
    /// Session for a freshly issued token
    #[must_use]
    pub fn authenticated(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            is_authenticated: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionEnvelope {
    state: Session,
    #[serde(default)]
    version: u32,
}

/// Key/value persistence boundary
///
/// Values are JSON documents; implementations are internally synchronized and
/// last-write-wins.
pub trait SessionStorage: Send + Sync {
    /// Read a value
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write a value
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be written.
    fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Delete a value
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be written.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage; forgets everything when dropped
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Create empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Storage backed by one JSON document on disk
///
/// The document is loaded when opened and rewritten on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<Map<String, Value>>,
}

impl FileStorage {
    /// Open (or start) the document at `path`
    ///
    /// A missing file starts empty. A file that is not a JSON object is
    /// logged and treated as empty; it is replaced on the next write.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let items = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Map<String, Value>>(&contents) {
                Ok(items) => items,
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "Ignoring unreadable session file");
                    Map::new()
                },
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(error) => return Err(error.into()),
        };

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Path of the backing document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, items: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(items)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_item(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        items.insert(key.to_string(), value);
        self.flush(&items)
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().unwrap_or_else(PoisonError::into_inner);
        if items.remove(key).is_some() {
            self.flush(&items)?;
        }
        Ok(())
    }
}

/// Typed access to the persisted session
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Wrap a storage backend
    #[must_use]
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Session store over fresh in-memory storage
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()))
    }

    /// Current session
    ///
    /// Absent and unreadable sessions both read as `None`.
    #[must_use]
    pub fn read(&self) -> Option<Session> {
        let value = match self.storage.get_item(SESSION_KEY) {
            Ok(value) => value?,
            Err(error) => {
                tracing::warn!(%error, "Session could not be read");
                return None;
            },
        };

        match serde_json::from_value::<SessionEnvelope>(value) {
            Ok(envelope) => Some(envelope.state),
            Err(error) => {
                tracing::warn!(%error, "Ignoring malformed session");
                None
            },
        }
    }

    /// Persist a session, replacing the previous one
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the session cannot be stored.
    pub fn write(&self, session: &Session) -> Result<(), StorageError> {
        let envelope = SessionEnvelope {
            state: session.clone(),
            version: SESSION_VERSION,
        };
        self.storage.set_item(SESSION_KEY, serde_json::to_value(envelope)?)
    }

    /// Forget the session
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the backing store cannot be written.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.storage.remove_item(SESSION_KEY)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

impl CredentialSource for SessionStore {
    fn bearer_token(&self) -> Option<String> {
        self.read().and_then(|session| session.token)
    }
}
