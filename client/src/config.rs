//! Client configuration
//!
//! Defaults suit a local API server. Every field can be overridden through
//! `with_*` builders or `SOUNDWAVE_*` environment variables.
//!
//! ```no_run
//! use soundwave::config::ClientConfig;
//!
//! # fn main() -> Result<(), soundwave::config::ConfigError> {
//! let config = ClientConfig::from_env()?.with_max_restarts(5);
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Base URL used when none is configured
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// Raw value found
        value: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    Validation(String),
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// API base URL; request paths are appended to it
    pub api_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Session file; `None` keeps the session in memory
    pub session_path: Option<PathBuf>,
    /// Capacity of the intent bus feeding routines
    pub broadcast_capacity: usize,
    /// How often a crashed routine is restarted
    pub max_restarts: u32,
    /// Whether a 401 on an authenticated endpoint signs the user out
    pub sign_out_on_unauthorized: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
            session_path: None,
            broadcast_capacity: 256,
            max_restarts: 3,
            sign_out_on_unauthorized: true,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `SOUNDWAVE_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("SOUNDWAVE_API_URL") {
            config.api_url = url;
        }
        if let Some(secs) = parse::<u64>(&lookup, "SOUNDWAVE_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup("SOUNDWAVE_SESSION_PATH") {
            config.session_path = Some(PathBuf::from(path));
        }
        if let Some(capacity) = parse(&lookup, "SOUNDWAVE_BROADCAST_CAPACITY")? {
            config.broadcast_capacity = capacity;
        }
        if let Some(restarts) = parse(&lookup, "SOUNDWAVE_MAX_RESTARTS")? {
            config.max_restarts = restarts;
        }

        Ok(config)
    }

    /// Set the API base URL
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Persist the session to a file
    #[must_use]
    pub fn with_session_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_path = Some(path.into());
        self
    }

    /// Set the intent bus capacity
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    /// Set the routine restart limit
    #[must_use]
    pub const fn with_max_restarts(mut self, max_restarts: u32) -> Self {
        self.max_restarts = max_restarts;
        self
    }

    /// Choose whether a 401 signs the user out
    #[must_use]
    pub const fn with_sign_out_on_unauthorized(mut self, enabled: bool) -> Self {
        self.sign_out_on_unauthorized = enabled;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Validation("request_timeout must be > 0".to_string()));
        }
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::Validation("broadcast_capacity must be > 0".to_string()));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError> {
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { var, value })
        })
        .transpose()
}
