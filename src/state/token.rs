//! Client-cached bearer token.

use std::sync::{PoisonError, RwLock};

use crate::net::types::AuthToken;

pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<AuthToken>;
    fn set(&self, token: AuthToken);
    fn clear(&self);
}

/// Process-memory token store, the local-storage stand-in.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<Option<AuthToken>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<AuthToken> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set(&self, token: AuthToken) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}
