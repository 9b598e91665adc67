//! Auth form actions: login, register, logout.
//!
//! DESIGN
//! ======
//! Actions run the auth operations against an isolated upstream connection
//! and turn the outcome into an HTTP response. The bearer token issued by the
//! auth API is kept in an HTTP-only cookie; the browser never sees it from
//! script. Navigation requested by an operation is recorded and becomes the
//! redirect.
//!
//! ERROR HANDLING
//! ==============
//! A failed login or register answers `422` with the field error map. Logout
//! always clears the cookie and redirects, whatever the auth API said.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;

use axum::Extension;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use super::HostState;
use super::session::{RequestSession, auth_client, inbound_cookies};
use crate::config::PortalConfig;
use crate::guard::get_post_login_redirect;
use crate::net::error::{ApiError, FieldErrors, to_field_errors};
use crate::net::types::AuthToken;
use crate::services::auth::{AuthClient, AuthOptions};
use crate::util::navigate::RecordingNavigator;

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

/// Body of a rejected action.
#[derive(Debug, Serialize)]
pub struct ActionFailure {
    pub errors: FieldErrors,
}

// =============================================================================
// COOKIES
// =============================================================================

#[must_use]
pub fn auth_cookie(config: &PortalConfig, token: &AuthToken) -> Cookie<'static> {
    Cookie::build((config.auth_cookie_name.clone(), token.as_str().to_owned()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .build()
}

#[must_use]
pub fn expired_auth_cookie(config: &PortalConfig) -> Cookie<'static> {
    Cookie::build((config.auth_cookie_name.clone(), String::new()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /login`
pub async fn login(
    State(state): State<HostState>,
    Extension(session): Extension<RequestSession>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Json(form): Json<LoginForm>,
) -> Response {
    let navigator = Arc::new(RecordingNavigator::new());
    let auth = match action_client(&state, &session, None, &headers, &navigator) {
        Ok(auth) => auth,
        Err(e) => return rejected(&e),
    };
    let options = AuthOptions::redirect(post_login_target(&state.config, query.as_deref()));

    match auth.login(&form.email, &form.password, &options).await {
        Ok(_) => signed_in(&state.config, &auth, &navigator),
        Err(e) => rejected(&e),
    }
}

/// `POST /register`
pub async fn register(
    State(state): State<HostState>,
    Extension(session): Extension<RequestSession>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    Json(form): Json<RegisterForm>,
) -> Response {
    let navigator = Arc::new(RecordingNavigator::new());
    let auth = match action_client(&state, &session, None, &headers, &navigator) {
        Ok(auth) => auth,
        Err(e) => return rejected(&e),
    };
    let options = AuthOptions::redirect(post_login_target(&state.config, query.as_deref()));

    match auth
        .register(&form.name, &form.email, &form.password, &form.password_confirmation, &options)
        .await
    {
        Ok(_) => signed_in(&state.config, &auth, &navigator),
        Err(e) => rejected(&e),
    }
}

/// `POST /logout`
pub async fn logout(
    State(state): State<HostState>,
    Extension(session): Extension<RequestSession>,
    headers: HeaderMap,
) -> Response {
    let navigator = Arc::new(RecordingNavigator::new());
    match action_client(&state, &session, session.token.as_ref(), &headers, &navigator) {
        Ok(auth) => {
            if let Err(e) = auth.logout(&AuthOptions::redirect(state.config.login_path.clone())).await {
                tracing::warn!(error = %e, "upstream logout failed, clearing cookie anyway");
            }
        }
        Err(e) => tracing::warn!(error = %e, "no upstream for logout, clearing cookie anyway"),
    }

    let location = navigator.take().unwrap_or_else(|| state.config.login_path.clone());
    let jar = CookieJar::new().add(expired_auth_cookie(&state.config));
    (jar, Redirect::to(&location)).into_response()
}

/// Sign-in actions pass no token so a stale cookie is never sent upstream.
fn action_client(
    state: &HostState,
    session: &RequestSession,
    token: Option<&AuthToken>,
    headers: &HeaderMap,
    navigator: &Arc<RecordingNavigator>,
) -> Result<AuthClient, ApiError> {
    let connection = state.upstream.isolated(inbound_cookies(headers).as_deref())?;
    Ok(auth_client(
        &state.config,
        connection,
        session.store.clone(),
        token,
        navigator.clone(),
    ))
}

fn post_login_target(config: &PortalConfig, query: Option<&str>) -> String {
    get_post_login_redirect(query.unwrap_or_default(), &config.home_path, &config.public_url)
}

fn signed_in(config: &PortalConfig, auth: &AuthClient, navigator: &RecordingNavigator) -> Response {
    let location = navigator.take().unwrap_or_else(|| config.home_path.clone());
    let redirect = Redirect::to(&location);
    match auth.token() {
        Some(token) => (CookieJar::new().add(auth_cookie(config, &token)), redirect).into_response(),
        None => redirect.into_response(),
    }
}

fn rejected(error: &ApiError) -> Response {
    let errors = to_field_errors(Some(error));
    (StatusCode::UNPROCESSABLE_ENTITY, Json(ActionFailure { errors })).into_response()
}
