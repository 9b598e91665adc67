//! Auth-session state for one request or one client session.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards and page loaders read it; auth operations are the only
//! writers. On the server a fresh store is built per inbound request so one
//! user's session can never leak into another's.
//!
//! DESIGN
//! ======
//! `SessionStore` is a cheap `Clone` handle over shared state. Getters hand
//! out owned snapshots, so nothing a caller holds can write back into the
//! store. Concurrent writers race; the last write wins.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde_json::Value;

use crate::net::error::{FieldErrors, FieldList, clear_error_fields};
use crate::net::types::User;

/// Snapshot of the session state.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: Option<User>,
    pub is_loading: bool,
    pub errors: FieldErrors,
}

impl Session {
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

// =============================================================================
// TRUTHINESS
// =============================================================================

/// Loading-flag coercion.
///
/// Rules: `false`, zero, NaN, empty strings, `None` and JSON `null` are
/// false. Everything else is true, including empty arrays and objects.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

macro_rules! truthy_int {
    ($($t:ty),*) => {
        $(impl Truthy for $t {
            fn is_truthy(&self) -> bool {
                *self != 0
            }
        })*
    };
}

truthy_int!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl Truthy for f64 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for f32 {
    fn is_truthy(&self) -> bool {
        *self != 0.0 && !self.is_nan()
    }
}

impl Truthy for str {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        true
    }
}

impl<T: Truthy> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.as_ref().is_some_and(Truthy::is_truthy)
    }
}

impl<T: Truthy + ?Sized> Truthy for &T {
    fn is_truthy(&self) -> bool {
        (**self).is_truthy()
    }
}

impl Truthy for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f.is_truthy()),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Session>>,
}

impl SessionStore {
    /// Fresh store in the initial shape: no user, not loading, no errors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded from server data (client hydration).
    #[must_use]
    pub fn hydrate(user: Option<User>) -> Self {
        let store = Self::new();
        store.set_user(user);
        store
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.read().clone()
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().user.is_some()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.read().is_loading
    }

    #[must_use]
    pub fn errors(&self) -> FieldErrors {
        self.read().errors.clone()
    }

    /// Replace the user wholesale.
    pub fn set_user(&self, user: Option<User>) {
        self.write().user = user;
    }

    /// Replace the error map. `None` is stored as an empty map.
    pub fn set_errors(&self, errors: Option<FieldErrors>) {
        self.write().errors = errors.unwrap_or_default();
    }

    pub fn set_loading(&self, loading: impl Truthy) {
        self.write().is_loading = loading.is_truthy();
    }

    pub fn clear_errors(&self) {
        self.write().errors = FieldErrors::new();
    }

    /// Drop the named error fields, leaving the rest untouched.
    pub fn clear_error_fields(&self, fields: impl FieldList) {
        let mut state = self.write();
        state.errors = clear_error_fields(&state.errors, fields);
    }

    /// Reset user, errors and loading together.
    pub fn clear_auth_state(&self) {
        *self.write() = Session::default();
    }

    /// Start of an auth operation: errors cleared, loading on.
    pub(crate) fn begin(&self) {
        let mut state = self.write();
        state.errors = FieldErrors::new();
        state.is_loading = true;
    }

    /// Successful end of an auth operation.
    pub(crate) fn succeed(&self, user: Option<User>) {
        let mut state = self.write();
        state.user = user;
        state.is_loading = false;
    }

    /// Failed end of an auth operation.
    pub(crate) fn fail(&self, errors: FieldErrors) {
        let mut state = self.write();
        state.errors = errors;
        state.is_loading = false;
    }

    fn read(&self) -> RwLockReadGuard<'_, Session> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Session> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
