//! Wire DTOs for the auth and GraphQL APIs.
//!
//! DESIGN
//! ======
//! The session layer only cares whether a user is present, so `User` is an
//! opaque JSON object: a string id or a missing name must not turn a valid
//! session into a parse failure. Envelopes tolerate missing fields because
//! the auth API omits `user` on business failures.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The authenticated user as returned by `GET /api/user`.
///
/// The record belongs to the auth API. Nothing here depends on its shape
/// beyond being a JSON object; the accessors are conveniences for logging
/// and display.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct User(Map<String, Value>);

impl User {
    /// The `id` field in whatever form the API sends it (number or string).
    #[must_use]
    pub fn id(&self) -> Option<&Value> {
        self.0.get("id")
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn as_map_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for User {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Bearer token issued at login/registration, normalized to its string form.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    /// Normalize a token payload.
    ///
    /// Accepts a raw string or an object carrying `access_token` or `token`.
    /// Empty strings and any other shape yield `None`.
    #[must_use]
    pub fn normalize(raw: &Value) -> Option<Self> {
        match raw {
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_owned())),
            Value::Object(obj) => obj
                .get("access_token")
                .or_else(|| obj.get("token"))
                .and_then(Self::normalize),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Authorization` header value for server-issued calls.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl From<String> for AuthToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// Tokens never show up in logs.
impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// `{success, user}` envelope shared by login, register, logout and user.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AuthEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    token: Option<Value>,
    #[serde(default)]
    access_token: Option<Value>,
}

impl AuthEnvelope {
    /// The issued token, if the envelope carries one.
    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        self.token
            .as_ref()
            .and_then(AuthToken::normalize)
            .or_else(|| self.access_token.as_ref().and_then(AuthToken::normalize))
    }

    /// The user, but only when the envelope also signals success.
    #[must_use]
    pub fn into_user(self) -> Option<User> {
        if self.success { self.user } else { None }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub password_confirmation: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: &'a Value,
}

/// One entry of a GraphQL `errors` array.
#[derive(Clone, Debug, Deserialize)]
pub struct GraphQlErrorEntry {
    pub message: String,
}
