//! Request interceptor chain
//!
//! Every call made through [`ApiClient`](crate::ApiClient) passes three stages:
//!
//! 1. **Request**: may decorate the outgoing request (credential attach)
//! 2. **Response**: sees successful responses (identity by default)
//! 3. **Error**: sees failures; returns an error, so it can report a failure
//!    but never turn it into a success

use crate::error::HttpError;
use crate::request::{ApiRequest, ApiResponse, RequestSummary};
use serde_json::Value;
use std::sync::Arc;

/// Supplies the bearer token for outgoing requests
pub trait CredentialSource: Send + Sync {
    /// Current token, if a session is established
    fn bearer_token(&self) -> Option<String>;
}

/// Fixed credential, for tools and tests
impl CredentialSource for Option<String> {
    fn bearer_token(&self) -> Option<String> {
        self.clone()
    }
}

/// A stage in the interceptor chain
pub trait Interceptor: Send + Sync {
    /// Decorate an outgoing request
    fn on_request(&self, request: ApiRequest) -> ApiRequest {
        request
    }

    /// Observe a successful response
    fn on_response(&self, response: ApiResponse) -> ApiResponse {
        response
    }

    /// Observe a failure
    fn on_error(&self, error: HttpError) -> HttpError {
        error
    }
}

/// What gets logged about a failure
#[derive(Debug, Clone, PartialEq)]
pub enum FailureReport {
    /// A response arrived with a non-success status
    Response {
        /// HTTP status code
        status: u16,
        /// Response body
        data: Value,
    },
    /// The request went out but nothing came back
    Request(RequestSummary),
    /// The request never went out
    Message(String),
}

impl FailureReport {
    /// Classify a failure for reporting
    ///
    /// Returns `None` for 401 responses: those are expected when a session
    /// expires and are handled by callers, not logged.
    #[must_use]
    pub fn classify(error: &HttpError) -> Option<Self> {
        match error {
            HttpError::Response { status: 401, .. } => None,
            HttpError::Response { status, data, .. } => Some(Self::Response {
                status: *status,
                data: data.clone(),
            }),
            HttpError::Transport { request, .. } => Some(Self::Request(request.clone())),
            HttpError::Local(message) => Some(Self::Message(message.clone())),
        }
    }
}

/// Destination for failure reports
pub trait FailureReporter: Send + Sync {
    /// Record a failure
    fn report(&self, report: &FailureReport);
}

/// Reports failures as `tracing` error events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn report(&self, report: &FailureReport) {
        match report {
            FailureReport::Response { status, data } => {
                tracing::error!(status, %data, "Request failed");
            },
            FailureReport::Request(request) => {
                tracing::error!(%request, "No response received");
            },
            FailureReport::Message(message) => {
                tracing::error!(error = %message, "Error");
            },
        }
    }
}

/// Default interceptor: attaches the session token and reports failures
#[derive(Clone)]
pub struct AuthInterceptor {
    credentials: Arc<dyn CredentialSource>,
    reporter: Arc<dyn FailureReporter>,
}

impl AuthInterceptor {
    /// Create an interceptor reporting through [`TracingReporter`]
    #[must_use]
    pub fn new(credentials: Arc<dyn CredentialSource>) -> Self {
        Self::with_reporter(credentials, Arc::new(TracingReporter))
    }

    /// Create an interceptor with a custom reporter
    #[must_use]
    pub fn with_reporter(credentials: Arc<dyn CredentialSource>, reporter: Arc<dyn FailureReporter>) -> Self {
        Self { credentials, reporter }
    }
}

impl std::fmt::Debug for AuthInterceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthInterceptor").finish_non_exhaustive()
    }
}

impl Interceptor for AuthInterceptor {
    fn on_request(&self, request: ApiRequest) -> ApiRequest {
        match self.credentials.bearer_token() {
            Some(token) if !token.is_empty() => {
                request.with_header("Authorization", format!("Bearer {token}"))
            },
            _ => request,
        }
    }

    fn on_error(&self, error: HttpError) -> HttpError {
        if let Some(report) = FailureReport::classify(&error) {
            self.reporter.report(&report);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Method;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<FailureReport>>);

    impl FailureReporter for Collect {
        fn report(&self, report: &FailureReport) {
            if let Ok(mut reports) = self.0.lock() {
                reports.push(report.clone());
            }
        }
    }

    fn interceptor(token: Option<&str>) -> (AuthInterceptor, Arc<Collect>) {
        let reporter = Arc::new(Collect::default());
        let credentials: Arc<dyn CredentialSource> = Arc::new(token.map(str::to_string));
        (
            AuthInterceptor::with_reporter(credentials, Arc::clone(&reporter) as Arc<dyn FailureReporter>),
            reporter,
        )
    }

    fn reports(collect: &Collect) -> Vec<FailureReport> {
        collect.0.lock().map(|r| r.clone()).unwrap_or_default()
    }

    #[test]
    fn test_attach_adds_bearer_token() {
        let (interceptor, _) = interceptor(Some("T"));
        let request = interceptor.on_request(ApiRequest::new(Method::Get, "/songs"));
        assert_eq!(request.header("Authorization"), Some("Bearer T"));
    }

    #[test]
    fn test_attach_without_token_adds_nothing() {
        let (interceptor, _) = interceptor(None);
        let request = interceptor.on_request(ApiRequest::new(Method::Get, "/songs"));
        assert_eq!(request.header("Authorization"), None);
    }

    #[test]
    fn test_unauthorized_is_not_reported() {
        let (interceptor, reporter) = interceptor(None);
        let error = interceptor.on_error(HttpError::Response {
            status: 401,
            data: json!("expired"),
            request: RequestSummary::new(Method::Get, "/songs/mine"),
        });

        assert!(error.is_unauthorized());
        assert!(reports(&reporter).is_empty());
    }

    #[test]
    fn test_server_error_is_reported_and_propagated() {
        let (interceptor, reporter) = interceptor(None);
        let error = interceptor.on_error(HttpError::Response {
            status: 500,
            data: json!({"message": "boom"}),
            request: RequestSummary::new(Method::Get, "/songs"),
        });

        assert_eq!(error.status(), Some(500));
        assert_eq!(
            reports(&reporter),
            vec![FailureReport::Response {
                status: 500,
                data: json!({"message": "boom"}),
            }]
        );
    }

    #[test]
    fn test_missing_response_reports_request() {
        let (interceptor, reporter) = interceptor(None);
        let summary = RequestSummary::new(Method::Get, "/favorites");
        let _ = interceptor.on_error(HttpError::Transport {
            request: summary.clone(),
            message: "timed out".to_string(),
        });

        assert_eq!(reports(&reporter), vec![FailureReport::Request(summary)]);
    }
}
