//! Per-request session recovery.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs in front of every page and action. Each inbound request gets a fresh
//! `SessionStore`; nothing from one user's session is visible to another
//! request. When the auth cookie is present the auth API is asked for the
//! current user with the inbound cookies forwarded and the cookie value as
//! the bearer token.
//!
//! DESIGN
//! ======
//! `Upstream` is the seam between handlers and the auth API. Session checks
//! share one stateless fetch and forward cookies per request. Form actions
//! get an isolated cookie jar seeded with the inbound cookies, so CSRF
//! priming for one user never leaks into another user's requests.
//!
//! A cookie that no longer yields a user is expired on the way out, unless
//! the handler already set that cookie itself (a re-login after expiry).

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use reqwest::cookie::Jar;
use reqwest::header::HeaderValue;
use url::Url;

use super::HostState;
use super::auth::expired_auth_cookie;
use crate::config::PortalConfig;
use crate::guard::RouteKind;
use crate::net::error::ApiError;
use crate::net::fetch::{
    CookieSource, Fetch, ForwardingFetch, JarCookies, NoCookies, ReqwestFetch, StaticCookies,
};
use crate::net::http::HttpClient;
use crate::net::types::AuthToken;
use crate::services::auth::AuthClient;
use crate::state::session::SessionStore;
use crate::state::token::{MemoryTokenStore, TokenStore};
use crate::util::navigate::{Navigator, NoopNavigator};

// =============================================================================
// UPSTREAM
// =============================================================================

/// Everything an `HttpClient` needs to reach the auth API for one request.
pub struct Connection {
    pub fetch: Arc<dyn Fetch>,
    pub cookies: Arc<dyn CookieSource>,
}

pub trait Upstream: Send + Sync {
    /// Read-only connection: inbound cookies are forwarded, nothing is stored.
    fn forwarding(&self, inbound_cookies: Option<&str>) -> Connection;

    /// Connection with its own cookie state, seeded with the inbound cookies.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error if the connection cannot be built.
    fn isolated(&self, inbound_cookies: Option<&str>) -> Result<Connection, ApiError>;
}

pub struct ReqwestUpstream {
    shared: Arc<ReqwestFetch>,
    origin: Url,
}

impl ReqwestUpstream {
    /// # Errors
    ///
    /// Returns a `Network` error if the shared HTTP client cannot be built.
    pub fn new(origin: Url) -> Result<Self, ApiError> {
        let shared = ReqwestFetch::stateless().map_err(|e| ApiError::network(e.0))?;
        Ok(Self { shared: Arc::new(shared), origin })
    }
}

impl Upstream for ReqwestUpstream {
    fn forwarding(&self, inbound_cookies: Option<&str>) -> Connection {
        let shared: Arc<dyn Fetch> = self.shared.clone();
        forward_cookies(shared, inbound_cookies)
    }

    fn isolated(&self, inbound_cookies: Option<&str>) -> Result<Connection, ApiError> {
        let jar = Arc::new(Jar::default());
        for cookie in Cookie::split_parse(inbound_cookies.unwrap_or_default()).filter_map(Result::ok) {
            jar.add_cookie_str(&format!("{}={}", cookie.name(), cookie.value()), &self.origin);
        }
        let fetch = ReqwestFetch::with_jar(Arc::clone(&jar)).map_err(|e| ApiError::network(e.0))?;
        Ok(Connection { fetch: Arc::new(fetch), cookies: Arc::new(JarCookies::new(jar, self.origin.clone())) })
    }
}

/// Send `inbound_cookies` with every request made through `fetch`.
pub fn forward_cookies(fetch: Arc<dyn Fetch>, inbound_cookies: Option<&str>) -> Connection {
    let Some(header) = inbound_cookies else {
        return Connection { fetch, cookies: Arc::new(NoCookies) };
    };
    let cookies: Arc<dyn CookieSource> = Arc::new(StaticCookies::from_header(header));
    match HeaderValue::from_str(header) {
        Ok(value) => Connection { fetch: Arc::new(ForwardingFetch::new(fetch, value)), cookies },
        Err(_) => {
            tracing::warn!("inbound cookie header is not forwardable");
            Connection { fetch, cookies }
        }
    }
}

/// Auth client bound to one inbound request.
pub(crate) fn auth_client(
    config: &PortalConfig,
    connection: Connection,
    store: SessionStore,
    token: Option<&AuthToken>,
    navigator: Arc<dyn Navigator>,
) -> AuthClient {
    let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
    if let Some(token) = token {
        tokens.set(token.clone());
    }
    let http = HttpClient::new(config.auth_base_url.as_str(), connection.fetch)
        .with_cookies(connection.cookies)
        .with_timeout(config.request_timeout);
    AuthClient::new(http, store, tokens, navigator, config.csrf_path.clone())
}

// =============================================================================
// REQUEST SESSION
// =============================================================================

/// Session state for one inbound request, available to handlers as an
/// `Extension`.
#[derive(Debug, Clone)]
pub struct RequestSession {
    pub store: SessionStore,
    pub token: Option<AuthToken>,
    pub route: RouteKind,
}

impl RequestSession {
    /// An auth cookie was sent but did not yield a user.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.token.is_some() && !self.store.is_authenticated()
    }
}

/// All inbound `Cookie` headers joined into one.
#[must_use]
pub fn inbound_cookies(headers: &HeaderMap) -> Option<String> {
    let joined = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    (!joined.is_empty()).then_some(joined)
}

#[must_use]
pub fn auth_token(headers: &HeaderMap, cookie_name: &str) -> Option<AuthToken> {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(Cookie::value)
        .filter(|value| !value.is_empty())
        .map(|value| AuthToken::from(value.to_owned()))
}

/// Build the session for a request to `path`.
pub async fn resolve_session(state: &HostState, headers: &HeaderMap, path: &str) -> RequestSession {
    let store = SessionStore::new();
    let token = auth_token(headers, &state.config.auth_cookie_name);

    if let Some(token) = &token {
        let connection = state.upstream.forwarding(inbound_cookies(headers).as_deref());
        let navigator: Arc<dyn Navigator> = Arc::new(NoopNavigator);
        let auth = auth_client(&state.config, connection, store.clone(), Some(token), navigator);
        if auth.get_user().await.is_none() {
            tracing::debug!(%path, "auth cookie did not yield a user");
        }
    }

    RequestSession { store, token, route: RouteKind::of(path) }
}

pub async fn session_middleware(State(state): State<HostState>, mut request: Request, next: Next) -> Response {
    let headers = request.headers().clone();
    let path = request.uri().path().to_owned();
    let session = resolve_session(&state, &headers, &path).await;
    let stale = session.is_stale();
    request.extensions_mut().insert(session);

    let response = next.run(request).await;
    if stale && !sets_cookie(&response, &state.config.auth_cookie_name) {
        let jar = CookieJar::new().add(expired_auth_cookie(&state.config));
        return (jar, response).into_response();
    }
    response
}

/// Whether a handler already wrote `name` (a fresh token or its own expiry).
fn sets_cookie(response: &Response, name: &str) -> bool {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| Cookie::parse(value).ok())
        .any(|cookie| cookie.name() == name)
}

// =============================================================================
// TEST HELPERS
// =============================================================================
