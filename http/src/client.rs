//! API client composing a transport with the interceptor chain

use crate::error::HttpError;
use crate::interceptor::{AuthInterceptor, CredentialSource, Interceptor};
use crate::request::{ApiRequest, ApiResponse, Method};
use crate::transport::Transport;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// HTTP client used by effect routines
///
/// Cloning is cheap; clones share the transport and interceptors.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl ApiClient {
    /// Create a client without interceptors
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            interceptors: Vec::new(),
        }
    }

    /// Create a client with the default chain: token attach plus failure logging
    #[must_use]
    pub fn with_credentials(transport: Arc<dyn Transport>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self::new(transport).with_interceptor(Arc::new(AuthInterceptor::new(credentials)))
    }

    /// Append an interceptor; stages run in the order interceptors were added
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Number of interceptors in the chain
    #[must_use]
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Issue a request
    ///
    /// # Errors
    ///
    /// Returns the transport's error after the error stage has seen it.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: Option<BTreeMap<String, String>>,
    ) -> Result<ApiResponse, HttpError> {
        let mut request = ApiRequest::new(method, path);
        request.body = body;
        if let Some(headers) = headers {
            request.headers.extend(headers);
        }
        self.send(request).await
    }

    /// Issue a prepared request
    ///
    /// # Errors
    ///
    /// Returns the transport's error after the error stage has seen it.
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
        let request = self
            .interceptors
            .iter()
            .fold(request, |request, interceptor| interceptor.on_request(request));

        tracing::debug!("Sending request");

        match self.transport.execute(request).await {
            Ok(response) => Ok(self
                .interceptors
                .iter()
                .fold(response, |response, interceptor| interceptor.on_response(response))),
            Err(error) => Err(self
                .interceptors
                .iter()
                .fold(error, |error, interceptor| interceptor.on_error(error))),
        }
    }

    /// GET a path
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str) -> Result<ApiResponse, HttpError> {
        self.request(Method::Get, path, None, None).await
    }

    /// POST a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn post(&self, path: &str, body: Option<Value>) -> Result<ApiResponse, HttpError> {
        self.request(Method::Post, path, body, None).await
    }

    /// PUT a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::Put, path, Some(body), None).await
    }

    /// DELETE a path
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, HttpError> {
        self.request(Method::Delete, path, None, None).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}
