//! Fetch primitive and cookie sources used by the HTTP client.
//!
//! DESIGN
//! ======
//! `HttpClient` never talks to the network directly; it hands a fully built
//! `HttpRequest` to a `Fetch` implementation. A server process builds one
//! purpose-bound fetch (forwarded cookies, bearer token) per inbound request
//! instead of relying on ambient globals, and tests script responses.
//!
//! The CSRF header value comes from a `CookieSource`, which for
//! `ReqwestFetch` is the same jar the requests are sent with.

#[cfg(test)]
#[path = "fetch_test.rs"]
mod fetch_test;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum_extra::extract::cookie::Cookie;
use reqwest::Method;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};
use url::Url;

const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// Cookie policy for a request. The client always sends `Include`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials {
    Include,
    SameOrigin,
    Omit,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced an HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait::async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// =============================================================================
// REQWEST FETCH
// =============================================================================

/// `reqwest`-backed fetch, optionally with a persistent cookie jar.
pub struct ReqwestFetch {
    http: reqwest::Client,
    jar: Option<Arc<Jar>>,
}

impl ReqwestFetch {
    /// Fetch with a fresh, empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_jar(Arc::new(Jar::default()))
    }

    /// Fetch that sends and stores cookies through `jar`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_jar(jar: Arc<Jar>) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http, jar: Some(jar) })
    }

    /// Fetch that neither stores nor sends cookies on its own. Shared across
    /// users by the server host, which forwards cookies per request.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn stateless() -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError(format!("HTTP client build failed: {e}")))?;
        Ok(Self { http, jar: None })
    }

    #[must_use]
    pub fn jar(&self) -> Option<Arc<Jar>> {
        self.jar.clone()
    }
}

#[async_trait::async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .http
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

// =============================================================================
// FORWARDING FETCH
// =============================================================================

/// Adds an inbound request's `Cookie` header to every outgoing request that
/// does not already carry one.
pub struct ForwardingFetch {
    inner: Arc<dyn Fetch>,
    cookie: HeaderValue,
}

impl ForwardingFetch {
    #[must_use]
    pub fn new(inner: Arc<dyn Fetch>, cookie: HeaderValue) -> Self {
        Self { inner, cookie }
    }
}

#[async_trait::async_trait]
impl Fetch for ForwardingFetch {
    async fn fetch(&self, mut request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if request.credentials != Credentials::Omit && !request.headers.contains_key(COOKIE) {
            request.headers.insert(COOKIE, self.cookie.clone());
        }
        self.inner.fetch(request).await
    }
}

// =============================================================================
// COOKIE SOURCES
// =============================================================================

/// Read access to cookies visible to the client. Values are returned raw
/// (still percent-encoded).
pub trait CookieSource: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

/// No cookies at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCookies;

impl CookieSource for NoCookies {
    fn cookie(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Fixed cookie set, typically parsed from an inbound `Cookie` header.
#[derive(Debug, Default, Clone)]
pub struct StaticCookies {
    cookies: BTreeMap<String, String>,
}

impl StaticCookies {
    #[must_use]
    pub fn from_header(header: &str) -> Self {
        let cookies = Cookie::split_parse(header)
            .filter_map(Result::ok)
            .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
            .collect();
        Self { cookies }
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_owned(), value.to_owned());
        self
    }
}

impl CookieSource for StaticCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }
}

/// Cookies stored in a `reqwest` jar for one origin.
pub struct JarCookies {
    jar: Arc<Jar>,
    origin: Url,
}

impl JarCookies {
    #[must_use]
    pub fn new(jar: Arc<Jar>, origin: Url) -> Self {
        Self { jar, origin }
    }
}

impl CookieSource for JarCookies {
    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.origin)?;
        let header = header.to_str().ok()?;
        Cookie::split_parse(header)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == name)
            .map(|cookie| cookie.value().to_owned())
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
