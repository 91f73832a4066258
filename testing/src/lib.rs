//! # Soundwave Testing
//!
//! Testing utilities for the Soundwave client.
//!
//! This crate provides:
//! - [`ReducerTest`], a Given-When-Then harness for reducers
//! - [`MockTransport`], a scripted HTTP transport that records every request
//! - [`RecordingReporter`], a failure reporter that keeps what it was given
//! - Store helpers and proptest strategies
//!
//! ## Example
//!
//! ```ignore
//! use soundwave_testing::{MockTransport, RecordingReporter};
//! use soundwave_http::Method;
//! use serde_json::json;
//!
//! let transport = MockTransport::new()
//!     .reply(Method::Get, "/songs", 200, json!([]))
//!     .reply(Method::Post, "/auth/signin", 401, json!("bad credentials"));
//!
//! // ... drive the store ...
//!
//! assert_eq!(transport.requests_to("/auth/signin").len(), 1);
//! ```


pub use reducer_test::{assertions, ReducerTest};

/// Mock implementations of the HTTP boundary
pub mod mocks {
    use async_trait::async_trait;
    use serde_json::Value;
    use soundwave_http::{
        ApiRequest, ApiResponse, FailureReport, FailureReporter, HttpError, Method, Transport,
    };
    use std::collections::VecDeque;
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    type Scripted = Result<ApiResponse, HttpError>;

    struct Route {
        method: Method,
        path: String,
        delay: Duration,
        replies: VecDeque<Scripted>,
    }

    /// Scripted transport
    ///
    /// Replies are matched on method and full path (query included). When a
    /// route has several scripted replies they are served in order and the
    /// last one repeats. Unmatched requests get a 404.
    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<Vec<Route>>,
        requests: Mutex<Vec<ApiRequest>>,
    }

    impl MockTransport {
        /// Create a transport with no routes
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a reply; statuses outside 2xx become [`HttpError::Response`]
        #[must_use]
        pub fn reply(self, method: Method, path: &str, status: u16, data: Value) -> Self {
            let reply = if (200..300).contains(&status) {
                Ok(ApiResponse::new(status, data))
            } else {
                Err(HttpError::Response {
                    status,
                    data,
                    request: soundwave_http::RequestSummary::new(method, path),
                })
            };
            self.script(method, path, reply)
        }

        /// Script a failure with no response
        #[must_use]
        pub fn fail(self, method: Method, path: &str, message: &str) -> Self {
            let error = HttpError::Transport {
                request: soundwave_http::RequestSummary::new(method, path),
                message: message.to_string(),
            };
            self.script(method, path, Err(error))
        }

        /// Delay every reply on a route
        #[must_use]
        pub fn delay(self, method: Method, path: &str, delay: Duration) -> Self {
            {
                let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(route) = routes.iter_mut().find(|r| r.method == method && r.path == path) {
                    route.delay = delay;
                }
            }
            self
        }

        fn script(self, method: Method, path: &str, reply: Scripted) -> Self {
            {
                let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
                match routes.iter_mut().find(|r| r.method == method && r.path == path) {
                    Some(route) => route.replies.push_back(reply),
                    None => routes.push(Route {
                        method,
                        path: path.to_string(),
                        delay: Duration::ZERO,
                        replies: VecDeque::from([reply]),
                    }),
                }
            }
            self
        }

        /// Every request received, in arrival order
        #[must_use]
        pub fn requests(&self) -> Vec<ApiRequest> {
            self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        /// Requests received for a path
        #[must_use]
        pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
            self.requests()
                .into_iter()
                .filter(|r| r.path == path)
                .collect()
        }

        fn next_reply(&self, request: &ApiRequest) -> (Duration, Scripted) {
            let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
            let route = routes
                .iter_mut()
                .find(|r| r.method == request.method && r.path == request.path);

            match route {
                Some(route) => {
                    let reply = if route.replies.len() > 1 {
                        route.replies.pop_front()
                    } else {
                        route.replies.front().cloned()
                    };
                    (route.delay, reply.unwrap_or_else(|| Err(not_found(request))))
                },
                None => (Duration::ZERO, Err(not_found(request))),
            }
        }
    }

    fn not_found(request: &ApiRequest) -> HttpError {
        HttpError::Response {
            status: 404,
            data: serde_json::json!({ "message": format!("No scripted reply for {}", request.summary()) }),
            request: request.summary(),
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, HttpError> {
            let (delay, reply) = self.next_reply(&request);
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            reply
        }
    }

    /// Failure reporter that records every report
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        reports: Mutex<Vec<FailureReport>>,
    }

    impl RecordingReporter {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Reports received so far
        #[must_use]
        pub fn reports(&self) -> Vec<FailureReport> {
            self.reports.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        /// Whether nothing was reported
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.reports.lock().unwrap_or_else(PoisonError::into_inner).is_empty()
        }
    }

    impl FailureReporter for RecordingReporter {
        fn report(&self, report: &FailureReport) {
            self.reports
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(report.clone());
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use soundwave_core::reducer::Reducer;
    use soundwave_runtime::Store;
    use std::time::Duration;

    /// Install a test-friendly tracing subscriber once per process
    ///
    /// Honors `RUST_LOG`; defaults to debug output for the soundwave crates.
    pub fn init_test_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("soundwave=debug,soundwave_runtime=debug"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// Poll the store until `predicate` holds or `timeout` elapses
    ///
    /// Returns whether the predicate was satisfied.
    pub async fn wait_for_state<S, A, E, R, F>(store: &Store<S, A, E, R>, predicate: F, timeout: Duration) -> bool
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: Fn(&S) -> bool,
    {
        tokio::time::timeout(timeout, async {
            while !store.state(&predicate).await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .is_ok()
    }
}

/// Property-based testing strategies
pub mod properties {
    use proptest::prelude::*;

    /// Non-empty, human-looking error messages
    pub fn error_message() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z ,.'!]{0,40}"
    }

    /// Opaque session tokens
    pub fn token() -> impl Strategy<Value = String> {
        "[A-Za-z0-9_.-]{8,64}"
    }

    /// Document ids as issued by the API
    pub fn document_id() -> impl Strategy<Value = String> + Clone {
        "[a-f0-9]{24}"
    }
}

pub use helpers::{init_test_tracing, wait_for_state};
pub use mocks::{MockTransport, RecordingReporter};
