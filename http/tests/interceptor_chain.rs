//! End-to-end tests of the interceptor chain over a real reqwest transport

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use serde_json::json;
use soundwave_http::{
    ApiClient, AuthInterceptor, CredentialSource, FailureReport, FailureReporter, HttpError, Method,
    ReqwestTransport, RequestSummary,
};
use soundwave_testing::{MockTransport, RecordingReporter};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(base_url: &str, token: Option<&str>) -> (ApiClient, Arc<RecordingReporter>) {
    let transport = ReqwestTransport::new(base_url, Duration::from_secs(2)).unwrap();
    let reporter = Arc::new(RecordingReporter::new());
    let credentials: Arc<dyn CredentialSource> = Arc::new(token.map(str::to_string));
    let interceptor = AuthInterceptor::with_reporter(credentials, Arc::clone(&reporter) as Arc<dyn FailureReporter>);

    (
        ApiClient::new(Arc::new(transport)).with_interceptor(Arc::new(interceptor)),
        reporter,
    )
}

#[tokio::test]
async fn bearer_token_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/songs/mine"))
        .and(header("Authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (client, reporter) = client(&server.uri(), Some("T"));
    let response = client.get("/songs/mine").await.unwrap();

    assert_eq!(response.data, json!([]));
    assert!(reporter.is_empty());
}

#[tokio::test]
async fn no_token_means_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signin"))
        .and(body_json(json!({"email": "a@b.c", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
        .mount(&server)
        .await;

    let (client, _) = client(&server.uri(), None);
    let response = client
        .post("/auth/signin", Some(json!({"email": "a@b.c", "password": "pw"})))
        .await
        .unwrap();
    assert_eq!(response.data["token"], "abc");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn unauthorized_propagates_without_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/signin"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let (client, reporter) = client(&server.uri(), None);
    let error = client.post("/auth/signin", None).await.unwrap_err();

    assert!(error.is_unauthorized());
    assert_eq!(error.user_message(), "bad credentials");
    assert!(reporter.is_empty());
}

#[tokio::test]
async fn server_error_is_reported_and_propagated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/songs"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "db down"})))
        .mount(&server)
        .await;

    let (client, reporter) = client(&server.uri(), Some("T"));
    let error = client.get("/songs").await.unwrap_err();

    assert_eq!(error.status(), Some(500));
    assert_eq!(error.user_message(), "db down");
    assert_eq!(
        reporter.reports(),
        vec![FailureReport::Response {
            status: 500,
            data: json!({"message": "db down"}),
        }]
    );
}

#[tokio::test]
async fn unreachable_server_reports_the_request() {
    // Nothing listens on port 1
    let (client, reporter) = client("http://127.0.0.1:1", None);
    let error = client.get("/favorites").await.unwrap_err();

    assert!(matches!(error, HttpError::Transport { .. }));
    assert_eq!(
        reporter.reports(),
        vec![FailureReport::Request(RequestSummary::new(Method::Get, "/favorites"))]
    );
}

#[tokio::test]
async fn extra_headers_are_forwarded_over_mock_transport() {
    let transport = Arc::new(MockTransport::new().reply(Method::Put, "/songs/1", 200, json!({"_id": "1"})));
    let client = ApiClient::with_credentials(
        Arc::clone(&transport) as Arc<dyn soundwave_http::Transport>,
        Arc::new(Some("T".to_string())),
    );

    let headers = [("X-Client".to_string(), "soundwave".to_string())].into_iter().collect();
    let response = client
        .request(Method::Put, "/songs/1", Some(json!({"title": "x"})), Some(headers))
        .await
        .unwrap();

    assert_eq!(response.data["_id"], "1");
    let sent = transport.requests();
    assert_eq!(sent[0].header("x-client"), Some("soundwave"));
    assert_eq!(sent[0].header("authorization"), Some("Bearer T"));
    assert_eq!(client.interceptor_count(), 1);
}
