//! # Soundwave HTTP
//!
//! HTTP client boundary for the Soundwave client.
//!
//! Effect routines never talk to reqwest directly. They call an [`ApiClient`],
//! which runs every request through an interceptor chain (credential attach,
//! success pass-through, failure classification) and a [`Transport`].
//!
//! ## Example
//!
//! ```no_run
//! use soundwave_http::{ApiClient, ReqwestTransport};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() -> Result<(), soundwave_http::HttpError> {
//! let transport = ReqwestTransport::new("http://localhost:5000/api", Duration::from_secs(10))?;
//! let token: Option<String> = Some("session-token".to_string());
//! let client = ApiClient::with_credentials(Arc::new(transport), Arc::new(token));
//!
//! let response = client.get("/songs/recent").await?;
//! println!("{}", response.data);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod interceptor;
pub mod request;
pub mod transport;

pub use client::ApiClient;
pub use error::{HttpError, FALLBACK_MESSAGE};
pub use interceptor::{
    AuthInterceptor, CredentialSource, FailureReport, FailureReporter, Interceptor, TracingReporter,
};
pub use request::{ApiRequest, ApiResponse, Method, RequestSummary};
pub use transport::{ReqwestTransport, Transport};
