//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The host serves page data and auth form actions for the portal. Every
//! request except `/healthz` passes through the session middleware, which
//! recovers the user from the auth API before any handler runs. Pages are
//! the router fallback: any path not claimed by an action is a page.


pub mod auth;
pub mod pages;
pub mod session;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::config::PortalConfig;
use crate::net::error::ApiError;
use session::{ReqwestUpstream, Upstream};

/// Shared host state, cloned into every handler.
#[derive(Clone)]
pub struct HostState {
    pub config: Arc<PortalConfig>,
    pub upstream: Arc<dyn Upstream>,
}

impl HostState {
    #[must_use]
    pub fn new(config: PortalConfig, upstream: Arc<dyn Upstream>) -> Self {
        Self { config: Arc::new(config), upstream }
    }

    /// State talking to the configured auth API over `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns a `Network` error if the HTTP client cannot be built.
    pub fn from_config(config: PortalConfig) -> Result<Self, ApiError> {
        let upstream = ReqwestUpstream::new(config.auth_base_url.clone())?;
        Ok(Self::new(config, Arc::new(upstream)))
    }
}

pub fn app(state: HostState) -> Router {
    Router::new()
        .route("/login", get(pages::page).post(auth::login))
        .route("/register", get(pages::page).post(auth::register))
        .route("/logout", post(auth::logout))
        .fallback(pages::page)
        .layer(middleware::from_fn_with_state(state.clone(), session::session_middleware))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
