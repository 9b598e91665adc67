use super::*;
use crate::net::error::ErrorKind;
use crate::net::fetch::StaticCookies;
use crate::net::fetch::test_helpers::{MockFetch, Reply};
use crate::state::token::MemoryTokenStore;
use crate::util::navigate::RecordingNavigator;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

const BASE: &str = "http://localhost:8001/";

fn client(mock: &Arc<MockFetch>) -> HttpClient {
    HttpClient::new(BASE, mock.clone())
}

#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
}

impl UnauthorizedHandler for CountingHandler {
    fn on_unauthorized(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// URL resolution
// =============================================================================

#[test]
fn resolve_url_joins_relative_paths() {
    let http = client(&MockFetch::new(vec![]));
    assert_eq!(http.base_url(), "http://localhost:8001");
    assert_eq!(http.resolve_url("/api/user"), "http://localhost:8001/api/user");
    assert_eq!(http.resolve_url("api/user"), "http://localhost:8001/api/user");
}

#[test]
fn resolve_url_keeps_absolute_urls() {
    let http = client(&MockFetch::new(vec![]));
    assert_eq!(http.resolve_url("https://other.example/x"), "https://other.example/x");
    assert_eq!(http.resolve_url("/odd:path"), "http://localhost:8001/odd:path");
}

#[test]
fn resolve_url_treats_colon_in_relative_path_as_relative() {
    let http = client(&MockFetch::new(vec![]));
    assert_eq!(http.resolve_url("api/v1:beta"), "http://localhost:8001/api/v1:beta");
    assert_eq!(http.resolve_url("HTTP://Other.example/x"), "HTTP://Other.example/x");
}

#[test]
fn has_scheme_detection() {
    assert!(has_scheme("http://a"));
    assert!(has_scheme("git+ssh://a"));
    assert!(!has_scheme("/a:b"));
    assert!(!has_scheme("1http://a"));
    assert!(!has_scheme("no-colon"));
}

// =============================================================================
// Headers
// =============================================================================

#[tokio::test]
async fn request_sends_json_headers_credentials_and_decoded_csrf() {
    let mock = MockFetch::new(vec![Reply::Json(200, json!({ "ok": true }))]);
    let http = client(&mock).with_cookies(Arc::new(StaticCookies::default().with(CSRF_COOKIE, "abc%3D%3D+1")));

    let _: Value = http.get("/api/user", &RequestOptions::default()).await.unwrap();

    let req = &mock.requests()[0];
    assert_eq!(req.credentials, Credentials::Include);
    assert_eq!(req.headers[ACCEPT], "application/json");
    assert_eq!(req.headers[CONTENT_TYPE], "application/json");
    assert_eq!(req.headers[CSRF_HEADER], "abc==+1");
}

#[tokio::test]
async fn missing_csrf_cookie_omits_header() {
    let mock = MockFetch::new(vec![Reply::Json(200, json!({}))]);
    let _: Value = client(&mock)
        .get("/api/user", &RequestOptions::default())
        .await
        .unwrap();
    assert!(mock.requests()[0].headers.get(CSRF_HEADER).is_none());
}

#[tokio::test]
async fn caller_headers_win_over_defaults() {
    let mock = MockFetch::new(vec![Reply::Json(200, json!({}))]);
    let mut options = RequestOptions::default();
    options.headers.insert(ACCEPT, HeaderValue::from_static("text/plain"));
    let http = client(&mock).with_bearer(&AuthToken::from("t0k".to_owned()));

    let _: Value = http.get("/x", &options).await.unwrap();

    let req = &mock.requests()[0];
    assert_eq!(req.headers[ACCEPT], "text/plain");
    assert_eq!(req.headers[AUTHORIZATION], "Bearer t0k");
}

#[tokio::test]
async fn post_serializes_body() {
    let mock = MockFetch::new(vec![Reply::Json(201, json!({ "id": 1 }))]);
    let body: Value = client(&mock)
        .post("/api/items", &json!({ "name": "x" }), &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(body["id"], 1);
    let req = &mock.requests()[0];
    assert_eq!(req.method, Method::POST);
    assert_eq!(req.body.as_deref(), Some(r#"{"name":"x"}"#));
}

// =============================================================================
// Error mapping
// =============================================================================

#[tokio::test]
async fn unauthorized_runs_handler_before_error() {
    let mock = MockFetch::new(vec![Reply::Json(401, json!({ "message": "Unauthenticated." }))]);
    let handler = Arc::new(CountingHandler::default());
    let http = client(&mock).with_unauthorized_handler(handler.clone());

    let err = http
        .get::<Value>("/api/user", &RequestOptions::default())
        .await
        .unwrap_err();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Unauthenticated.");
}

#[tokio::test]
async fn unauthorized_runs_handler_on_raw_requests_too() {
    let mock = MockFetch::new(vec![Reply::Raw(401, "")]);
    let handler = Arc::new(CountingHandler::default());
    let http = client(&mock).with_unauthorized_handler(handler.clone());

    let err = http
        .request(Method::GET, "/x", None, &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(err.to_string(), "HTTP 401");
}

#[tokio::test]
async fn clear_session_handler_resets_store_token_and_navigates() {
    let store = SessionStore::new();
    store.set_loading(true);
    let tokens = Arc::new(MemoryTokenStore::new());
    tokens.set(AuthToken::from("t".to_owned()));
    let nav = Arc::new(RecordingNavigator::new());
    let handler = ClearSessionHandler::new(store.clone(), tokens.clone(), nav.clone(), "/login");

    handler.on_unauthorized();

    assert!(!store.is_loading());
    assert!(tokens.get().is_none());
    assert_eq!(nav.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn non_2xx_carries_status_data_and_message() {
    let body = json!({ "message": "The given data was invalid.", "errors": { "email": ["taken"] } });
    let mock = MockFetch::new(vec![Reply::Json(422, body.clone())]);
    let err = client(&mock)
        .post::<Value>("/api/register", &json!({}), &RequestOptions::default())
        .await
        .unwrap_err();
    match err {
        ApiError::Http { status, message, data } => {
            assert_eq!(status, 422);
            assert_eq!(message, "The given data was invalid.");
            assert_eq!(data, Some(body));
        }
        other => panic!("expected Http, got {other:?}"),
    }
}

#[tokio::test]
async fn non_2xx_without_message_uses_generic_text() {
    let mock = MockFetch::new(vec![Reply::Raw(503, "<html>down</html>")]);
    let err = client(&mock)
        .get::<Value>("/x", &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.to_string(), "HTTP 503");
    assert_eq!(err.kind(), ErrorKind::Server);
}

#[tokio::test]
async fn invalid_json_on_success_is_parse_error() {
    let mock = MockFetch::new(vec![Reply::Raw(200, "not json")]);
    let err = client(&mock)
        .get::<Value>("/x", &RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Parse { .. }));
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn empty_success_body_decodes_as_null() {
    let mock = MockFetch::new(vec![Reply::Raw(204, "")]);
    let body: Value = client(&mock)
        .delete("/x", &RequestOptions::default())
        .await
        .unwrap();
    assert!(body.is_null());
}

#[tokio::test]
async fn transport_failure_becomes_network_error() {
    let mock = MockFetch::new(vec![Reply::Fail("connection refused")]);
    let err = client(&mock)
        .get::<Value>("/x", &RequestOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.status(), None);
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(err.to_string().contains("connection refused"));
}

#[tokio::test]
async fn timeout_becomes_flagged_network_error() {
    let mock = MockFetch::new(vec![Reply::Hang]);
    let err = client(&mock)
        .with_timeout(Duration::from_millis(20))
        .get::<Value>("/slow", &RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Network { timed_out: true, .. }));
    assert!(err.to_string().contains("timeout"));
    assert_eq!(mock.requests().len(), 1);
}

// =============================================================================
// GraphQL
// =============================================================================

#[tokio::test]
async fn graphql_returns_data() {
    let mock = MockFetch::new(vec![Reply::Json(200, json!({ "data": { "projects": [{ "id": 1 }] } }))]);
    let data: Value = HttpClient::new("http://localhost:8000", mock.clone())
        .graphql("{ projects { id } }", &json!({}), &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(data["projects"][0]["id"], 1);

    let req = &mock.requests()[0];
    assert_eq!(req.url, "http://localhost:8000/graphql");
    let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
    assert_eq!(sent, json!({ "query": "{ projects { id } }", "variables": {} }));
}

#[tokio::test]
async fn graphql_errors_array_raises_first_message() {
    let mock = MockFetch::new(vec![Reply::Json(
        200,
        json!({ "data": null, "errors": [{ "message": "Field 'x' missing" }, { "message": "second" }] }),
    )]);
    let err = client(&mock)
        .graphql::<Value>("{ x }", &json!({}), &RequestOptions::default())
        .await
        .unwrap_err();
    match err {
        ApiError::GraphQl { message, errors } => {
            assert_eq!(message, "Field 'x' missing");
            assert_eq!(errors.len(), 2);
        }
        other => panic!("expected GraphQl, got {other:?}"),
    }
}

#[tokio::test]
async fn graphql_empty_errors_array_is_fine() {
    let mock = MockFetch::new(vec![Reply::Json(200, json!({ "data": { "n": 2 }, "errors": [] }))]);
    let data: Value = client(&mock)
        .graphql("{ n }", &json!({}), &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(data["n"], 2);
}
