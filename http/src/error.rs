//! Error types for the HTTP boundary

use crate::request::RequestSummary;
use serde_json::Value;
use thiserror::Error;

/// Message shown when nothing more specific can be extracted from a failure
pub const FALLBACK_MESSAGE: &str = "Something went wrong. Please try again.";

/// Body fields checked, in order, for a server-provided error message
const MESSAGE_FIELDS: [&str; 3] = ["message", "error", "msg"];

/// Errors produced by a [`Transport`](crate::Transport) or [`ApiClient`](crate::ApiClient)
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// The server answered with a non-success status
    #[error("Request failed with status code {status}")]
    Response {
        /// HTTP status code
        status: u16,
        /// Decoded response body (a JSON string when the body was not JSON)
        data: Value,
        /// The request that failed
        request: RequestSummary,
    },

    /// The request was sent but no response came back
    #[error("{message}")]
    Transport {
        /// The request that failed
        request: RequestSummary,
        /// Transport-level description (connection refused, timeout, ...)
        message: String,
    },

    /// The request could not be built or the response could not be decoded
    #[error("{0}")]
    Local(String),
}

impl HttpError {
    /// Whether the server rejected the credentials (HTTP 401)
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Response { status: 401, .. })
    }

    /// Status code, when a response was received
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Response { status, .. } => Some(*status),
            Self::Transport { .. } | Self::Local(_) => None,
        }
    }

    /// Response body, when a response was received
    #[must_use]
    pub const fn data(&self) -> Option<&Value> {
        match self {
            Self::Response { data, .. } => Some(data),
            Self::Transport { .. } | Self::Local(_) => None,
        }
    }

    /// Human-readable message suitable for state
    ///
    /// Prefers a message carried by the response body (the body itself when
    /// it is a string, else its `message`, `error` or `msg` field), then the
    /// transport-level description, then [`FALLBACK_MESSAGE`].
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(message) = self.data().and_then(body_message) {
            return message;
        }

        let message = self.to_string();
        if message.trim().is_empty() {
            FALLBACK_MESSAGE.to_string()
        } else {
            message
        }
    }
}

fn body_message(data: &Value) -> Option<String> {
    match data {
        Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
        Value::Object(fields) => MESSAGE_FIELDS.iter().find_map(|key| match fields.get(*key) {
            Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
            _ => None,
        }),
        _ => None,
    }
}
