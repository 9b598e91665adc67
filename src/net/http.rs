//! JSON HTTP client with CSRF and 401 handling.
//!
//! DESIGN
//! ======
//! Every request includes credentials and JSON `Accept`/`Content-Type`
//! headers, plus `X-XSRF-TOKEN` when the `XSRF-TOKEN` cookie is visible.
//! Caller headers are applied last and win on conflicts.
//!
//! A 401 runs the `UnauthorizedHandler` before the error is returned, so the
//! handler fires even when the caller ends up swallowing the error.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures become `ApiError::Network` (no status) and expiry of
//! the request timeout becomes a `Network` error flagged `timed_out`. A 2xx
//! body that is not JSON is an `ApiError::Parse`; a non-2xx response is an
//! `ApiError::Http` whether or not its body parsed. Nothing is retried.

#[cfg(test)]
#[path = "http_test.rs"]
mod http_test;

use std::sync::Arc;
use std::time::Duration;

use percent_encoding::percent_decode_str;
use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::error::ApiError;
use super::fetch::{CookieSource, Credentials, Fetch, HttpRequest, HttpResponse, NoCookies};
use super::types::{AuthToken, GraphQlErrorEntry, GraphQlRequest};
use crate::state::session::SessionStore;
use crate::state::token::TokenStore;
use crate::util::navigate::Navigator;

pub const CSRF_COOKIE: &str = "XSRF-TOKEN";
pub const CSRF_HEADER: &str = "x-xsrf-token";
pub const GRAPHQL_PATH: &str = "/graphql";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const APPLICATION_JSON: &str = "application/json";

// =============================================================================
// UNAUTHORIZED HANDLING
// =============================================================================

/// Strategy run whenever a request comes back 401.
pub trait UnauthorizedHandler: Send + Sync {
    fn on_unauthorized(&self);
}

/// Default 401 strategy: drop the cached token, reset the session, go to login.
pub struct ClearSessionHandler {
    store: SessionStore,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
}

impl ClearSessionHandler {
    #[must_use]
    pub fn new(
        store: SessionStore,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self { store, tokens, navigator, login_path: login_path.into() }
    }
}

impl UnauthorizedHandler for ClearSessionHandler {
    fn on_unauthorized(&self) {
        tracing::info!(login_path = %self.login_path, "unauthorized response, clearing session");
        self.tokens.clear();
        self.store.clear_auth_state();
        self.navigator.navigate(&self.login_path);
    }
}

/// 401 strategy that only logs. Used where navigation makes no sense.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogUnauthorized;

impl UnauthorizedHandler for LogUnauthorized {
    fn on_unauthorized(&self) {
        tracing::debug!("unauthorized response");
    }
}

// =============================================================================
// CLIENT
// =============================================================================

/// Per-call overrides.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Merged over the default headers; these win on conflicts.
    pub headers: HeaderMap,
    /// Overrides the client timeout for this call.
    pub timeout: Option<Duration>,
}

#[derive(Clone)]
pub struct HttpClient {
    fetch: Arc<dyn Fetch>,
    cookies: Arc<dyn CookieSource>,
    unauthorized: Arc<dyn UnauthorizedHandler>,
    base_url: String,
    default_headers: HeaderMap,
    timeout: Duration,
}

impl HttpClient {
    /// Client for `base_url` sending through `fetch`. Starts with no visible
    /// cookies, a logging 401 handler and the 10 s timeout.
    pub fn new(base_url: impl Into<String>, fetch: Arc<dyn Fetch>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        Self {
            fetch,
            cookies: Arc::new(NoCookies),
            unauthorized: Arc::new(LogUnauthorized),
            base_url,
            default_headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: Arc<dyn CookieSource>) -> Self {
        self.cookies = cookies;
        self
    }

    #[must_use]
    pub fn with_unauthorized_handler(mut self, handler: Arc<dyn UnauthorizedHandler>) -> Self {
        self.unauthorized = handler;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Header sent on every request from this client.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// `Authorization: Bearer <token>` on every request from this client.
    #[must_use]
    pub fn with_bearer(self, token: &AuthToken) -> Self {
        match HeaderValue::from_str(&token.bearer()) {
            Ok(mut value) => {
                value.set_sensitive(true);
                self.with_header(AUTHORIZATION, value)
            }
            Err(_) => {
                tracing::warn!("auth token is not a valid header value, not attaching it");
                self
            }
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute paths are used as-is; relative ones are joined to the base URL.
    #[must_use]
    pub fn resolve_url(&self, path: &str) -> String {
        if Url::parse(path).is_ok() {
            return path.to_owned();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }

    /// Send a request and return the raw response for any non-401 status.
    ///
    /// # Errors
    ///
    /// `Network` when no response arrives in time, `Http` with status 401
    /// after the unauthorized handler has run.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        options: &RequestOptions,
    ) -> Result<HttpResponse, ApiError> {
        let url = self.resolve_url(path);
        let request = HttpRequest {
            method: method.clone(),
            url: url.clone(),
            headers: self.build_headers(options),
            body,
            credentials: Credentials::Include,
        };

        let limit = options.timeout.unwrap_or(self.timeout);
        tracing::debug!(%method, %url, "api request");
        let response = match tokio::time::timeout(limit, self.fetch.fetch(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::warn!(%method, %url, error = %e, "api request failed before a response");
                return Err(ApiError::network(e.0));
            }
            Err(_) => {
                tracing::warn!(%method, %url, timeout = ?limit, "api request timed out");
                return Err(ApiError::timeout(limit));
            }
        };
        tracing::debug!(%method, %url, status = response.status, "api response");

        if response.status == 401 {
            self.unauthorized.on_unauthorized();
            return Err(http_error(response.status, serde_json::from_str(&response.body).ok()));
        }
        Ok(response)
    }

    /// Send a request and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Everything [`HttpClient::request`] returns, plus `Http` for any other
    /// non-2xx status and `Parse` for a 2xx body that does not decode.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        let response = self.request(method, path, body, options).await?;

        if !response.is_success() {
            return Err(http_error(response.status, parse_body(&response.body).ok()));
        }

        let value = parse_body(&response.body)?;
        serde_json::from_value(value).map_err(|e| ApiError::Parse { message: e.to_string() })
    }

    /// # Errors
    ///
    /// See [`HttpClient::request_json`].
    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: &RequestOptions) -> Result<T, ApiError> {
        self.request_json(Method::GET, path, None, options).await
    }

    /// # Errors
    ///
    /// See [`HttpClient::request_json`].
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        self.request_json(Method::POST, path, Some(encode_body(body)?), options)
            .await
    }

    /// # Errors
    ///
    /// See [`HttpClient::request_json`].
    pub async fn put<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        self.request_json(Method::PUT, path, Some(encode_body(body)?), options)
            .await
    }

    /// # Errors
    ///
    /// See [`HttpClient::request_json`].
    pub async fn patch<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        self.request_json(Method::PATCH, path, Some(encode_body(body)?), options)
            .await
    }

    /// # Errors
    ///
    /// See [`HttpClient::request_json`].
    pub async fn delete<T: DeserializeOwned>(&self, path: &str, options: &RequestOptions) -> Result<T, ApiError> {
        self.request_json(Method::DELETE, path, None, options).await
    }

    /// POST a query to `/graphql` and decode `data`.
    ///
    /// # Errors
    ///
    /// Transport and HTTP errors as for [`HttpClient::post`]; a non-empty
    /// top-level `errors` array becomes `GraphQl` with the first message.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &Value,
        options: &RequestOptions,
    ) -> Result<T, ApiError> {
        let mut body: Value = self
            .post(GRAPHQL_PATH, &GraphQlRequest { query, variables }, options)
            .await?;

        if let Some(errors) = body
            .get_mut("errors")
            .and_then(Value::as_array_mut)
            .filter(|errors| !errors.is_empty())
        {
            let errors = std::mem::take(errors);
            let message = errors
                .first()
                .and_then(|first| serde_json::from_value::<GraphQlErrorEntry>(first.clone()).ok())
                .map_or_else(|| "GraphQL request failed".to_owned(), |entry| entry.message);
            tracing::warn!(%message, count = errors.len(), "graphql errors");
            return Err(ApiError::GraphQl { message, errors });
        }

        let data = body.get_mut("data").map(Value::take).unwrap_or(Value::Null);
        serde_json::from_value(data).map_err(|e| ApiError::Parse { message: e.to_string() })
    }

    fn build_headers(&self, options: &RequestOptions) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        for (name, value) in &self.default_headers {
            headers.insert(name.clone(), value.clone());
        }
        if let Some(token) = self.csrf_token() {
            match HeaderValue::from_str(&token) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(CSRF_HEADER), value);
                }
                Err(_) => tracing::warn!("XSRF-TOKEN cookie is not a valid header value"),
            }
        }
        for (name, value) in &options.headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    fn csrf_token(&self) -> Option<String> {
        let raw = self.cookies.cookie(CSRF_COOKIE)?;
        let decoded = percent_decode_str(&raw)
            .decode_utf8()
            .map_or(raw.clone(), |s| s.into_owned());
        (!decoded.is_empty()).then_some(decoded)
    }
}

/// Empty bodies (e.g. 204) decode as `null`.
fn parse_body(body: &str) -> Result<Value, ApiError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| ApiError::Parse { message: e.to_string() })
}

fn encode_body(body: &impl Serialize) -> Result<String, ApiError> {
    serde_json::to_string(body).map_err(|e| ApiError::Parse { message: e.to_string() })
}

fn http_error(status: u16, data: Option<Value>) -> ApiError {
    let message = data
        .as_ref()
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .map_or_else(|| format!("HTTP {status}"), str::to_owned);
    ApiError::Http { status, message, data }
}
