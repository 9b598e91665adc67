//! Route access control.
//!
//! SYSTEM CONTEXT
//! ==============
//! Page loaders (server host) and in-app navigation (client) consult these
//! helpers to decide whether a path may render for the current session.
//! Route groups are plain prefix lists; `/profile/anything` is protected
//! because it starts with `/profile`.
//!
//! A redirect is returned as `Err(GuardRedirect)`: the caller must stop and
//! send the user to `location`.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use url::Url;

use crate::net::types::User;
use crate::state::session::SessionStore;

pub const PROTECTED_PREFIXES: &[&str] =
    &["/dashboard", "/profile", "/settings", "/admin", "/projects", "/finances", "/agents"];
pub const GUEST_PREFIXES: &[&str] = &["/login", "/register", "/forgot-password", "/reset-password"];

pub const RETURN_TO_PARAM: &str = "returnTo";

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Protected,
    Guest,
    Public,
}

impl RouteKind {
    #[must_use]
    pub fn of(path: &str) -> Self {
        if is_protected_route(path) {
            Self::Protected
        } else if is_guest_route(path) {
            Self::Guest
        } else {
            Self::Public
        }
    }
}

#[must_use]
pub fn is_protected_route(path: &str) -> bool {
    PROTECTED_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[must_use]
pub fn is_guest_route(path: &str) -> bool {
    GUEST_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Stop rendering and send the user to `location`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("redirect to {location}")]
pub struct GuardRedirect {
    pub location: String,
}

impl GuardRedirect {
    fn to(location: impl Into<String>) -> Self {
        Self { location: location.into() }
    }
}

/// Redirect unless the session is authenticated.
///
/// # Errors
///
/// `GuardRedirect` to `redirect_to` when no user is present.
pub fn require_auth(store: &SessionStore, redirect_to: &str) -> Result<(), GuardRedirect> {
    if store.is_authenticated() { Ok(()) } else { Err(GuardRedirect::to(redirect_to)) }
}

/// Redirect when the session is authenticated.
///
/// # Errors
///
/// `GuardRedirect` to `redirect_to` when a user is present.
pub fn require_guest(store: &SessionStore, redirect_to: &str) -> Result<(), GuardRedirect> {
    if store.is_authenticated() { Err(GuardRedirect::to(redirect_to)) } else { Ok(()) }
}

// =============================================================================
// LOADERS
// =============================================================================

/// Data handed to a page after the guard lets it through.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadData {
    pub user: Option<User>,
    pub is_authenticated: bool,
}

#[derive(Debug, Clone)]
pub struct AuthLoadOptions {
    /// Login page the user is sent to, with the original target appended.
    pub redirect_to: String,
}

impl Default for AuthLoadOptions {
    fn default() -> Self {
        Self { redirect_to: "/login".to_owned() }
    }
}

#[derive(Debug, Clone)]
pub struct GuestLoadOptions {
    /// Where authenticated users are sent instead.
    pub redirect_to: String,
}

impl Default for GuestLoadOptions {
    fn default() -> Self {
        Self { redirect_to: "/dashboard".to_owned() }
    }
}

/// Loader for protected pages. `target` is the requested path plus query.
pub fn create_auth_load(
    options: AuthLoadOptions,
) -> impl Fn(&SessionStore, &str) -> Result<LoadData, GuardRedirect> + Send + Sync + Clone {
    move |store: &SessionStore, target: &str| {
        let session = store.snapshot();
        match session.user {
            Some(user) => Ok(LoadData { user: Some(user), is_authenticated: true }),
            None => {
                tracing::debug!(%target, "unauthenticated visit to protected page");
                Err(GuardRedirect::to(login_url(&options.redirect_to, target)))
            }
        }
    }
}

/// Loader for guest-only pages (login, register, password reset).
pub fn create_guest_load(
    options: GuestLoadOptions,
) -> impl Fn(&SessionStore) -> Result<LoadData, GuardRedirect> + Send + Sync + Clone {
    move |store: &SessionStore| {
        require_guest(store, &options.redirect_to)?;
        Ok(LoadData { user: None, is_authenticated: false })
    }
}

/// `<login>?returnTo=<encoded target>`.
#[must_use]
pub fn login_url(login_path: &str, target: &str) -> String {
    let separator = if login_path.contains('?') { '&' } else { '?' };
    format!("{login_path}{separator}{RETURN_TO_PARAM}={}", utf8_percent_encode(target, URI_COMPONENT))
}

// =============================================================================
// NAVIGATION
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationMode {
    pub require_auth: bool,
    pub require_guest: bool,
}

/// Pre-flight check for an in-app navigation. `false` means cancel and
/// redirect.
#[must_use]
pub fn navigation_guard(store: &SessionStore, pathname: &str, mode: NavigationMode) -> bool {
    let authenticated = store.is_authenticated();
    let allowed = !((mode.require_auth && !authenticated) || (mode.require_guest && authenticated));
    if !allowed {
        tracing::debug!(%pathname, authenticated, "navigation blocked");
    }
    allowed
}

/// Where to go after logging in.
///
/// Reads `returnTo` from `query` and accepts it only when it resolves to
/// `origin`; anything else falls back to `default`.
#[must_use]
pub fn get_post_login_redirect(query: &str, default: &str, origin: &Url) -> String {
    let query = query.strip_prefix('?').unwrap_or(query);
    let Some(return_to) = url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == RETURN_TO_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
    else {
        return default.to_owned();
    };

    let resolved = match origin.join(&return_to) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(%return_to, error = %e, "unparseable returnTo, using default");
            return default.to_owned();
        }
    };
    if resolved.origin() != origin.origin() {
        tracing::warn!(%return_to, "cross-origin returnTo rejected");
        return default.to_owned();
    }

    let mut target = resolved.path().to_owned();
    if let Some(q) = resolved.query() {
        target.push('?');
        target.push_str(q);
    }
    if let Some(fragment) = resolved.fragment() {
        target.push('#');
        target.push_str(fragment);
    }
    target
}
