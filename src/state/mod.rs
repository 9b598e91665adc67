//! Client state containers.
//!
//! SYSTEM CONTEXT
//! ==============
//! `session` holds the reactive-style auth state read by route guards and
//! pages; `token` holds the client-cached bearer token. Neither is a global:
//! callers construct one per request (server) or per client session.

pub mod session;
pub mod token;
