//! Session and authentication layer for the agent portal.
//!
//! SYSTEM CONTEXT
//! ==============
//! The portal talks to a Sanctum-style auth API (CSRF cookie, login,
//! register, logout, current user) and a GraphQL data API. This crate owns
//! the client side of that conversation: the HTTP client, the session store,
//! error classification, route guards, and an axum host that renders page
//! data per request.

pub mod config;
pub mod guard;
pub mod net;
pub mod routes;
pub mod services;
pub mod state;
pub mod util;
