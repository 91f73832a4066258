//! Transports: the one place a request actually leaves the process

use crate::error::HttpError;
use crate::request::{ApiRequest, ApiResponse, Method};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Executes a fully prepared request
///
/// Non-success statuses come back as [`HttpError::Response`]; a request that
/// never got an answer comes back as [`HttpError::Transport`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request
    ///
    /// # Errors
    ///
    /// See the trait documentation.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, HttpError>;
}

/// reqwest-backed transport against a base URL
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Create a transport with a per-request timeout
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Local`] if the TLS backend cannot be initialised.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Local(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Create a transport around an existing client
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Base URL every path is joined onto
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

const fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Decode a body the way the API is consumed: JSON when possible, else text
fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let summary = request.summary();
        let mut builder = self
            .client
            .request(reqwest_method(request.method), self.url(&request.path));

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| HttpError::Transport {
            request: summary.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| HttpError::Transport {
            request: summary.clone(),
            message: e.to_string(),
        })?;
        let data = decode_body(text);

        tracing::trace!(status = status.as_u16(), request = %summary, "Response received");

        if status.is_success() {
            Ok(ApiResponse::new(status.as_u16(), data))
        } else {
            Err(HttpError::Response {
                status: status.as_u16(),
                data,
                request: summary,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_joining() {
        let transport = ReqwestTransport::with_client(Client::new(), "http://localhost:5000/api/");
        assert_eq!(transport.base_url(), "http://localhost:5000/api");
        assert_eq!(transport.url("/songs"), "http://localhost:5000/api/songs");
        assert_eq!(transport.url("songs/mine"), "http://localhost:5000/api/songs/mine");
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(String::new()), Value::Null);
        assert_eq!(decode_body("{\"a\":1}".to_string()), json!({"a": 1}));
        assert_eq!(decode_body("bad credentials".to_string()), json!("bad credentials"));
    }
}
