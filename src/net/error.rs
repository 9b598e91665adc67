//! Failure taxonomy and user-facing error formatting.
//!
//! DESIGN
//! ======
//! `ApiError` is built at exactly one place per failure source (the HTTP
//! client for transport/HTTP/parse failures, the auth operations for
//! business rejections). Everything downstream works from `ErrorKind`, which
//! is derived from the variant rather than from ad hoc fields.
//!
//! `to_field_errors` reduces any failure to the `field -> messages` map the
//! session store keeps, so forms and banners render from one shape.

#[cfg(test)]
#[path = "error_test.rs"]
mod error_test;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::util::navigate::Navigator;

/// Field name -> human-readable messages. Never null; empty means no errors.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub const FIELD_AUTH: &str = "auth";
pub const FIELD_NETWORK: &str = "network";
pub const FIELD_SERVER: &str = "server";
pub const FIELD_GENERAL: &str = "general";

const MSG_AUTHENTICATION: &str = "Your session is invalid or has expired. Please log in again.";
const MSG_AUTHORIZATION: &str = "You do not have permission to perform this action.";
const MSG_TIMEOUT: &str = "The request timed out. Please check your connection and try again.";
const MSG_NETWORK: &str = "Unable to reach the server. Please check your internet connection.";
const MSG_SERVER: &str = "The server encountered an error. Please try again later.";
const MSG_UNKNOWN: &str = "An unexpected error occurred.";

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Errors produced by the HTTP client and the auth operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// No HTTP response was obtained (DNS, refused connection, abort, timeout).
    #[error("network request failed: {message}")]
    Network { message: String, timed_out: bool },

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String, data: Option<Value> },

    /// The response body was not valid JSON.
    #[error("response parse failed: {message}")]
    Parse { message: String },

    /// The GraphQL endpoint answered 2xx with a top-level `errors` array.
    #[error("graphql error: {message}")]
    GraphQl { message: String, errors: Vec<Value> },

    /// A 2xx envelope signalled business failure (`success: false`).
    #[error("{message}")]
    Rejected { message: String },

    /// CSRF priming failed; the dependent call was not attempted.
    #[error("failed to initialize protection: {source}")]
    Csrf { source: Box<ApiError> },
}

impl ApiError {
    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), timed_out: false }
    }

    pub(crate) fn timeout(after: Duration) -> Self {
        Self::Network { message: format!("request timeout after {}ms", after.as_millis()), timed_out: true }
    }

    pub(crate) fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected { message: message.into() }
    }

    /// HTTP status, when one was obtained.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Csrf { source } => source.status(),
            _ => None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => classify_status(None),
            Self::Http { status, .. } => classify_status(Some(*status)),
            Self::Csrf { source } => source.kind(),
            Self::Parse { .. } | Self::GraphQl { .. } | Self::Rejected { .. } => ErrorKind::Unknown,
        }
    }

    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    /// `message` from a structured error body, if any.
    fn payload_message(&self) -> Option<&str> {
        match self {
            Self::Http { data: Some(data), .. } => data
                .get("message")
                .and_then(Value::as_str)
                .filter(|m| !m.trim().is_empty()),
            Self::Csrf { source } => source.payload_message(),
            _ => None,
        }
    }

    fn payload(&self) -> Option<&Value> {
        match self {
            Self::Http { data, .. } => data.as_ref(),
            Self::Csrf { source } => source.payload(),
            _ => None,
        }
    }

    fn raw_message(&self) -> String {
        match self {
            Self::Network { message, .. }
            | Self::Http { message, .. }
            | Self::Parse { message }
            | Self::GraphQl { message, .. }
            | Self::Rejected { message } => message.clone(),
            Self::Csrf { source } => source.raw_message(),
        }
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Validation,
    Authentication,
    Authorization,
    Server,
    Unknown,
}

impl ErrorKind {
    /// Classify an optional failure. `None` is `Unknown`.
    #[must_use]
    pub fn classify(error: Option<&ApiError>) -> Self {
        error.map_or(Self::Unknown, ApiError::kind)
    }
}

/// Status rule, first match wins: no status is a network failure.
#[must_use]
pub fn classify_status(status: Option<u16>) -> ErrorKind {
    match status {
        None => ErrorKind::Network,
        Some(422) => ErrorKind::Validation,
        Some(401) => ErrorKind::Authentication,
        Some(403) => ErrorKind::Authorization,
        Some(500 | 502 | 503) => ErrorKind::Server,
        Some(_) => ErrorKind::Unknown,
    }
}

// =============================================================================
// FORMATTING
// =============================================================================

/// Reduce a failure to display-ready field errors.
#[must_use]
pub fn to_field_errors(error: Option<&ApiError>) -> FieldErrors {
    let Some(error) = error else {
        return single(FIELD_GENERAL, MSG_UNKNOWN.to_owned());
    };

    match error.kind() {
        ErrorKind::Validation => {
            let fields = validation_fields(error.payload());
            if fields.is_empty() {
                single(FIELD_GENERAL, general_message(error))
            } else {
                fields
            }
        }
        ErrorKind::Authentication => single(FIELD_AUTH, auth_message(error, MSG_AUTHENTICATION)),
        ErrorKind::Authorization => single(FIELD_AUTH, auth_message(error, MSG_AUTHORIZATION)),
        ErrorKind::Network => {
            let message = if error.raw_message().to_ascii_lowercase().contains("timeout") {
                MSG_TIMEOUT
            } else {
                MSG_NETWORK
            };
            single(FIELD_NETWORK, message.to_owned())
        }
        ErrorKind::Server => single(FIELD_SERVER, MSG_SERVER.to_owned()),
        ErrorKind::Unknown => single(FIELD_GENERAL, general_message(error)),
    }
}

/// First user-facing message for a failure, for banner-style display.
#[must_use]
pub fn user_message(error: &ApiError) -> String {
    to_field_errors(Some(error))
        .into_values()
        .flatten()
        .next()
        .unwrap_or_else(|| MSG_UNKNOWN.to_owned())
}

fn single(field: &str, message: String) -> FieldErrors {
    BTreeMap::from([(field.to_owned(), vec![message])])
}

fn auth_message(error: &ApiError, default: &str) -> String {
    error
        .payload_message()
        .map_or_else(|| default.to_owned(), str::to_owned)
}

fn general_message(error: &ApiError) -> String {
    if let Some(message) = error.payload_message() {
        return message.to_owned();
    }
    match error {
        ApiError::Rejected { message } => message.clone(),
        other => format!("An unexpected error occurred: {}", other.raw_message()),
    }
}

fn validation_fields(payload: Option<&Value>) -> FieldErrors {
    let Some(Value::Object(map)) = payload.and_then(|p| p.get("errors")) else {
        return FieldErrors::new();
    };

    map.iter()
        .filter_map(|(field, messages)| {
            let messages: Vec<String> = match messages {
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect(),
                Value::String(s) => vec![s.clone()],
                _ => Vec::new(),
            };
            (!messages.is_empty()).then(|| (field.clone(), messages))
        })
        .collect()
}

// =============================================================================
// FIELD SELECTION
// =============================================================================

/// One field name or a list of them.
pub trait FieldList {
    fn field_names(&self) -> Vec<&str>;
}

impl FieldList for &str {
    fn field_names(&self) -> Vec<&str> {
        vec![*self]
    }
}

impl FieldList for String {
    fn field_names(&self) -> Vec<&str> {
        vec![self.as_str()]
    }
}

impl FieldList for &[&str] {
    fn field_names(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl<const N: usize> FieldList for [&str; N] {
    fn field_names(&self) -> Vec<&str> {
        self.to_vec()
    }
}

impl FieldList for Vec<&str> {
    fn field_names(&self) -> Vec<&str> {
        self.clone()
    }
}

impl FieldList for Vec<String> {
    fn field_names(&self) -> Vec<&str> {
        self.iter().map(String::as_str).collect()
    }
}

/// Copy of `errors` without the named fields. Unknown names are ignored.
#[must_use]
pub fn clear_error_fields(errors: &FieldErrors, fields: impl FieldList) -> FieldErrors {
    let names = fields.field_names();
    errors
        .iter()
        .filter(|(field, _)| !names.contains(&field.as_str()))
        .map(|(field, messages)| (field.clone(), messages.clone()))
        .collect()
}

// =============================================================================
// HANDLING
// =============================================================================

#[derive(Debug, Clone)]
pub struct ErrorOptions {
    /// Schedule a navigation to `login_path` on `Authentication` failures.
    /// Off by default: the HTTP client already runs its own 401 handler.
    pub redirect_on_auth: bool,
    pub login_path: String,
    pub redirect_delay: Duration,
}

impl Default for ErrorOptions {
    fn default() -> Self {
        Self { redirect_on_auth: false, login_path: "/login".to_owned(), redirect_delay: Duration::from_millis(1500) }
    }
}

/// Format `error` and, when asked, schedule the login redirect.
pub fn handle_error(error: &ApiError, options: &ErrorOptions, navigator: &Arc<dyn Navigator>) -> FieldErrors {
    let kind = error.kind();
    tracing::debug!(?kind, status = ?error.status(), error = %error, "classified api error");

    if kind == ErrorKind::Authentication && options.redirect_on_auth {
        let navigator = Arc::clone(navigator);
        let login_path = options.login_path.clone();
        let delay = options.redirect_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    navigator.navigate(&login_path);
                });
            }
            Err(_) => navigator.navigate(&login_path),
        }
    }

    to_field_errors(Some(error))
}
