//! Session-level operations built on the HTTP client and the session store.

pub mod auth;
