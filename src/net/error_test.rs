use super::*;
use crate::util::navigate::RecordingNavigator;
use serde_json::json;

fn http(status: u16, data: Option<Value>) -> ApiError {
    ApiError::Http { status, message: format!("HTTP {status}"), data }
}

// =============================================================================
// classify
// =============================================================================

#[test]
fn classify_status_table() {
    assert_eq!(classify_status(Some(422)), ErrorKind::Validation);
    assert_eq!(classify_status(Some(401)), ErrorKind::Authentication);
    assert_eq!(classify_status(Some(403)), ErrorKind::Authorization);
    for status in [500, 502, 503] {
        assert_eq!(classify_status(Some(status)), ErrorKind::Server);
    }
    assert_eq!(classify_status(None), ErrorKind::Network);
    assert_eq!(classify_status(Some(418)), ErrorKind::Unknown);
    assert_eq!(classify_status(Some(504)), ErrorKind::Unknown);
}

#[test]
fn classify_none_is_unknown() {
    assert_eq!(ErrorKind::classify(None), ErrorKind::Unknown);
}

#[test]
fn classify_variants() {
    assert_eq!(ErrorKind::classify(Some(&ApiError::network("refused"))), ErrorKind::Network);
    assert_eq!(ErrorKind::classify(Some(&http(401, None))), ErrorKind::Authentication);
    assert_eq!(ErrorKind::classify(Some(&ApiError::rejected("Login failed"))), ErrorKind::Unknown);
    assert_eq!(
        ErrorKind::classify(Some(&ApiError::Parse { message: "expected value".into() })),
        ErrorKind::Unknown
    );
}

#[test]
fn csrf_error_delegates_status_and_kind() {
    let err = ApiError::Csrf { source: Box::new(http(503, None)) };
    assert_eq!(err.status(), Some(503));
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(err.to_string().starts_with("failed to initialize protection"));
}

// =============================================================================
// to_field_errors
// =============================================================================

#[test]
fn validation_copies_field_lists_and_drops_empty() {
    let err = http(
        422,
        Some(json!({
            "message": "The given data was invalid.",
            "errors": {
                "email": ["The email has already been taken."],
                "password": ["Too short.", "Needs a digit."],
                "name": []
            }
        })),
    );
    let fields = to_field_errors(Some(&err));
    assert_eq!(fields.len(), 2);
    assert_eq!(fields["email"], vec!["The email has already been taken."]);
    assert_eq!(fields["password"], vec!["Too short.", "Needs a digit."]);
    assert!(!fields.contains_key("name"));
}

#[test]
fn validation_without_field_map_falls_back_to_general() {
    let err = http(422, Some(json!({ "message": "Invalid input." })));
    let fields = to_field_errors(Some(&err));
    assert_eq!(fields[FIELD_GENERAL], vec!["Invalid input."]);
}

#[test]
fn authentication_uses_payload_message() {
    let err = http(401, Some(json!({ "message": "These credentials do not match our records." })));
    let fields = to_field_errors(Some(&err));
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[FIELD_AUTH], vec!["These credentials do not match our records."]);
}

#[test]
fn authentication_and_authorization_fall_back_to_defaults() {
    assert_eq!(to_field_errors(Some(&http(401, None)))[FIELD_AUTH], vec![MSG_AUTHENTICATION]);
    assert_eq!(to_field_errors(Some(&http(403, Some(json!({}))))), single(FIELD_AUTH, MSG_AUTHORIZATION.into()));
}

#[test]
fn network_timeout_gets_timeout_message() {
    let err = ApiError::timeout(Duration::from_secs(10));
    assert_eq!(to_field_errors(Some(&err))[FIELD_NETWORK], vec![MSG_TIMEOUT]);
}

#[test]
fn network_generic_message() {
    let err = ApiError::network("connection refused");
    assert_eq!(to_field_errors(Some(&err))[FIELD_NETWORK], vec![MSG_NETWORK]);
}

#[test]
fn server_errors_use_server_field() {
    let fields = to_field_errors(Some(&http(502, Some(json!({ "message": "upstream died" })))));
    assert_eq!(fields[FIELD_SERVER], vec![MSG_SERVER]);
}

#[test]
fn unknown_interpolates_raw_message() {
    let err = ApiError::Parse { message: "expected value at line 1".into() };
    assert_eq!(
        to_field_errors(Some(&err))[FIELD_GENERAL],
        vec!["An unexpected error occurred: expected value at line 1"]
    );
}

#[test]
fn rejected_message_is_used_verbatim() {
    let err = ApiError::rejected("Login failed");
    assert_eq!(to_field_errors(Some(&err))[FIELD_GENERAL], vec!["Login failed"]);
}

#[test]
fn none_maps_to_general() {
    assert_eq!(to_field_errors(None)[FIELD_GENERAL], vec![MSG_UNKNOWN]);
}

#[test]
fn user_message_returns_first_message() {
    assert_eq!(user_message(&ApiError::network("dns")), MSG_NETWORK);
}

// =============================================================================
// clear_error_fields
// =============================================================================

fn sample_errors() -> FieldErrors {
    BTreeMap::from([
        ("a".to_owned(), vec!["x".to_owned()]),
        ("b".to_owned(), vec!["y".to_owned()]),
        ("c".to_owned(), vec!["z".to_owned()]),
    ])
}

#[test]
fn clear_error_fields_removes_exactly_named_keys() {
    let cleared = clear_error_fields(&sample_errors(), ["a", "b"]);
    assert_eq!(cleared.keys().collect::<Vec<_>>(), vec!["c"]);
}

#[test]
fn clear_error_fields_is_idempotent() {
    let once = clear_error_fields(&sample_errors(), ["a", "b"]);
    let twice = clear_error_fields(&once, ["a", "b"]);
    assert_eq!(once, twice);
}

#[test]
fn clear_error_fields_accepts_single_name_and_ignores_missing() {
    let cleared = clear_error_fields(&sample_errors(), "b");
    assert_eq!(cleared.len(), 2);
    let untouched = clear_error_fields(&sample_errors(), "missing");
    assert_eq!(untouched, sample_errors());
}

#[test]
fn clear_error_fields_accepts_owned_lists() {
    let names = vec!["a".to_owned(), "c".to_owned()];
    let cleared = clear_error_fields(&sample_errors(), names);
    assert_eq!(cleared.keys().collect::<Vec<_>>(), vec!["b"]);
}

// =============================================================================
// handle_error
// =============================================================================

#[test]
fn handle_error_without_redirect_option_does_not_navigate() {
    let recorder = Arc::new(RecordingNavigator::new());
    let nav: Arc<dyn Navigator> = recorder.clone();
    let fields = handle_error(&http(401, None), &ErrorOptions::default(), &nav);
    assert!(fields.contains_key(FIELD_AUTH));
    assert!(recorder.last().is_none());
}

#[tokio::test]
async fn handle_error_schedules_delayed_login_redirect() {
    let recorder = Arc::new(RecordingNavigator::new());
    let nav: Arc<dyn Navigator> = recorder.clone();
    let options = ErrorOptions { redirect_on_auth: true, redirect_delay: Duration::from_millis(20), ..Default::default() };
    handle_error(&http(401, None), &options, &nav);
    assert!(recorder.last().is_none());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(recorder.last().as_deref(), Some("/login"));
}

#[tokio::test]
async fn handle_error_redirect_only_for_authentication() {
    let recorder = Arc::new(RecordingNavigator::new());
    let nav: Arc<dyn Navigator> = recorder.clone();
    let options = ErrorOptions { redirect_on_auth: true, redirect_delay: Duration::from_millis(1), ..Default::default() };
    handle_error(&http(403, None), &options, &nav);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(recorder.last().is_none());
}
