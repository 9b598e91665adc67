//! Page data for every path not claimed by an action.
//!
//! Protected pages run the auth loader, guest pages the guest loader, and
//! public pages just report the session. A guard redirect becomes
//! `303 See Other`.

#[cfg(test)]
#[path = "pages_test.rs"]
mod pages_test;

use axum::Extension;
use axum::extract::State;
use axum::http::Uri;
use axum::http::uri::PathAndQuery;
use axum::response::{IntoResponse, Json, Redirect, Response};

use super::HostState;
use super::session::RequestSession;
use crate::config::PortalConfig;
use crate::guard::{
    AuthLoadOptions, GuardRedirect, GuestLoadOptions, LoadData, RouteKind, create_auth_load, create_guest_load,
};

pub async fn page(State(state): State<HostState>, Extension(session): Extension<RequestSession>, uri: Uri) -> Response {
    match load(&state.config, &session, &uri) {
        Ok(data) => Json(data).into_response(),
        Err(redirect) => {
            tracing::debug!(path = %uri.path(), location = %redirect.location, "page redirect");
            Redirect::to(&redirect.location).into_response()
        }
    }
}

/// Run the loader matching the session's route kind.
///
/// # Errors
///
/// `GuardRedirect` when the page may not render for this session.
pub fn load(config: &PortalConfig, session: &RequestSession, uri: &Uri) -> Result<LoadData, GuardRedirect> {
    match session.route {
        RouteKind::Protected => {
            let target = uri.path_and_query().map_or_else(|| uri.path(), PathAndQuery::as_str);
            let load = create_auth_load(AuthLoadOptions { redirect_to: config.login_path.clone() });
            load(&session.store, target)
        }
        RouteKind::Guest => {
            let load = create_guest_load(GuestLoadOptions { redirect_to: config.home_path.clone() });
            load(&session.store)
        }
        RouteKind::Public => {
            let user = session.store.user();
            Ok(LoadData { is_authenticated: user.is_some(), user })
        }
    }
}
