//! Auth operations: CSRF priming, login, register, logout, current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! UI handlers (client) and form actions (server host) call these. Each one
//! follows the same shape: errors cleared and loading on, network call(s),
//! then either the user stored or the failure classified into the store.
//!
//! DESIGN
//! ======
//! CSRF priming is awaited to completion before login/register send their
//! request; a failed priming aborts the operation. Nothing here serializes
//! concurrent calls: two operations racing on one store end with whichever
//! wrote last.
//!
//! ERROR HANDLING
//! ==============
//! `get_user` never fails (any failure means "not logged in"); `logout`
//! swallows only 401. Everything else updates `errors` and returns the error.
//!
//! A failed login or register leaves `user` and the cached token alone. Only
//! a 401 signs the user out, through the unauthorized handler; a 422 or 5xx
//! on a second sign-in keeps the session that was already established.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;

use reqwest::Method;
use reqwest::cookie::Jar;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde_json::{Value, json};

use crate::config::PortalConfig;
use crate::net::error::{ApiError, to_field_errors};
use crate::net::fetch::{JarCookies, ReqwestFetch};
use crate::net::http::{ClearSessionHandler, HttpClient, RequestOptions};
use crate::net::types::{AuthEnvelope, AuthToken, LoginRequest, RegisterRequest, User};
use crate::state::session::SessionStore;
use crate::state::token::{MemoryTokenStore, TokenStore};
use crate::util::navigate::Navigator;

pub const LOGIN_PATH: &str = "/api/login";
pub const REGISTER_PATH: &str = "/api/register";
pub const LOGOUT_PATH: &str = "/api/logout";
pub const USER_PATH: &str = "/api/user";

const LOGIN_FAILED: &str = "Login failed";
const REGISTER_FAILED: &str = "Registration failed";

#[derive(Debug, Clone, Default)]
pub struct AuthOptions {
    /// Navigate here once the operation finishes.
    pub redirect_to: Option<String>,
}

impl AuthOptions {
    #[must_use]
    pub fn redirect(to: impl Into<String>) -> Self {
        Self { redirect_to: Some(to.into()) }
    }
}

pub struct AuthClient {
    http: HttpClient,
    store: SessionStore,
    tokens: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    csrf_path: String,
}

impl AuthClient {
    #[must_use]
    pub fn new(
        http: HttpClient,
        store: SessionStore,
        tokens: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
        csrf_path: impl Into<String>,
    ) -> Self {
        Self { http, store, tokens, navigator, csrf_path: csrf_path.into() }
    }

    /// Client-side wiring: one cookie jar, one store and one token cache for
    /// the lifetime of the client session, with the clearing 401 handler.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error if the HTTP client cannot be built.
    pub fn connect(config: &PortalConfig, navigator: Arc<dyn Navigator>) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let fetch = ReqwestFetch::with_jar(Arc::clone(&jar)).map_err(|e| ApiError::network(e.0))?;
        let cookies = JarCookies::new(jar, config.auth_base_url.clone());
        let store = SessionStore::new();
        let tokens: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        let handler = ClearSessionHandler::new(
            store.clone(),
            Arc::clone(&tokens),
            Arc::clone(&navigator),
            config.login_path.clone(),
        );
        let http = HttpClient::new(config.auth_base_url.as_str(), Arc::new(fetch))
            .with_cookies(Arc::new(cookies))
            .with_unauthorized_handler(Arc::new(handler))
            .with_timeout(config.request_timeout);
        Ok(Self::new(http, store, tokens, navigator, config.csrf_path.clone()))
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        self.tokens.get()
    }

    /// Prime the `XSRF-TOKEN` cookie.
    ///
    /// # Errors
    ///
    /// Any failure is wrapped in `ApiError::Csrf`.
    pub async fn init_csrf(&self) -> Result<(), ApiError> {
        let wrap = |source: ApiError| ApiError::Csrf { source: Box::new(source) };
        let response = self
            .http
            .request(Method::GET, &self.csrf_path, None, &self.request_options())
            .await
            .map_err(wrap)?;
        if !response.is_success() {
            let status = response.status;
            tracing::warn!(status, "csrf priming rejected");
            return Err(wrap(ApiError::Http { status, message: format!("HTTP {status}"), data: None }));
        }
        Ok(())
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// CSRF, transport and HTTP errors, or `Rejected` when the API answers
    /// 2xx without a user.
    pub async fn login(&self, email: &str, password: &str, options: &AuthOptions) -> Result<User, ApiError> {
        self.store.begin();
        let result = async {
            self.init_csrf().await?;
            let envelope: AuthEnvelope = self
                .http
                .post(LOGIN_PATH, &LoginRequest { email, password }, &self.request_options())
                .await?;
            accept_envelope(envelope, LOGIN_FAILED)
        }
        .await;
        self.finish_sign_in("login", result, options)
    }

    /// Create an account; the new user is authenticated immediately.
    ///
    /// # Errors
    ///
    /// As for [`AuthClient::login`].
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        password_confirmation: &str,
        options: &AuthOptions,
    ) -> Result<User, ApiError> {
        self.store.begin();
        let result = async {
            self.init_csrf().await?;
            let body = RegisterRequest { name, email, password, password_confirmation };
            let envelope: AuthEnvelope = self
                .http
                .post(REGISTER_PATH, &body, &self.request_options())
                .await?;
            accept_envelope(envelope, REGISTER_FAILED)
        }
        .await;
        self.finish_sign_in("register", result, options)
    }

    /// Log out. Local state is cleared whatever the API answers.
    ///
    /// # Errors
    ///
    /// Any failure except 401, after the state has been cleared.
    pub async fn logout(&self, options: &AuthOptions) -> Result<(), ApiError> {
        self.store.begin();
        let result = self
            .http
            .post::<Value>(LOGOUT_PATH, &json!({}), &self.request_options())
            .await;

        self.tokens.clear();
        self.store.clear_auth_state();

        let outcome = match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_unauthorized() => {
                tracing::debug!("logout on an already expired session");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "logout failed");
                self.store.set_errors(Some(to_field_errors(Some(&e))));
                Err(e)
            }
        };

        if let Some(target) = &options.redirect_to {
            self.navigator.navigate(target);
        }
        outcome
    }

    /// Recover the session. Returns `None` for any failure.
    pub async fn get_user(&self) -> Option<User> {
        self.store.begin();
        match self
            .http
            .get::<AuthEnvelope>(USER_PATH, &self.request_options())
            .await
        {
            Ok(envelope) => {
                if let Some(token) = envelope.token() {
                    self.tokens.set(token);
                }
                let user = envelope.into_user();
                if user.is_some() {
                    self.store.succeed(user.clone());
                } else {
                    self.store.clear_auth_state();
                }
                user
            }
            Err(e) => {
                if e.is_unauthorized() {
                    tracing::debug!("no active session");
                } else {
                    tracing::warn!(error = %e, "session check failed, treating as logged out");
                }
                self.store.clear_auth_state();
                None
            }
        }
    }

    fn finish_sign_in(
        &self,
        operation: &'static str,
        result: Result<(User, Option<AuthToken>), ApiError>,
        options: &AuthOptions,
    ) -> Result<User, ApiError> {
        match result {
            Ok((user, token)) => {
                if let Some(token) = token {
                    self.tokens.set(token);
                }
                tracing::info!(operation, user_id = ?user.id(), "signed in");
                self.store.succeed(Some(user.clone()));
                if let Some(target) = &options.redirect_to {
                    self.navigator.navigate(target);
                }
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(operation, status = ?e.status(), error = %e, "sign-in failed");
                // user untouched; a 401 was already cleared by the unauthorized handler
                self.store.fail(to_field_errors(Some(&e)));
                Err(e)
            }
        }
    }

    /// Attach the cached bearer token, when there is one.
    fn request_options(&self) -> RequestOptions {
        let mut options = RequestOptions::default();
        if let Some(token) = self.tokens.get() {
            if let Ok(mut value) = HeaderValue::from_str(&token.bearer()) {
                value.set_sensitive(true);
                options.headers.insert(AUTHORIZATION, value);
            }
        }
        options
    }
}

fn accept_envelope(envelope: AuthEnvelope, fallback: &str) -> Result<(User, Option<AuthToken>), ApiError> {
    let token = envelope.token();
    let message = envelope.message.clone();
    match envelope.into_user() {
        Some(user) => Ok((user, token)),
        None => Err(ApiError::rejected(message.unwrap_or_else(|| fallback.to_owned()))),
    }
}
