//! Portal configuration resolved once at startup.
//!
//! Each value comes from, in priority order: the build environment
//! (`option_env!`), the runtime environment, then a local-development
//! default.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::time::Duration;

use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_AUTH_URL: &str = "http://localhost:8001";
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
pub const DEFAULT_CSRF_PATH: &str = "/sanctum/csrf-cookie";
pub const DEFAULT_LOGIN_PATH: &str = "/login";
pub const DEFAULT_HOME_PATH: &str = "/dashboard";
pub const DEFAULT_AUTH_COOKIE: &str = "auth_token";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {value:?} ({reason})")]
    Invalid { var: &'static str, value: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    /// GraphQL/data API.
    pub api_base_url: Url,
    /// Auth API (CSRF, login, register, logout, user).
    pub auth_base_url: Url,
    /// Origin the portal itself is served from; `returnTo` must resolve here.
    pub public_url: Url,
    pub csrf_path: String,
    pub login_path: String,
    /// Landing area for authenticated users.
    pub home_path: String,
    pub request_timeout: Duration,
    /// HTTP-only cookie holding the bearer token (server-rendered host).
    pub auth_cookie_name: String,
    pub cookie_secure: bool,
}

impl PortalConfig {
    /// Resolve from build-time values, then the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a URL or the timeout does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(|var| build_time(var).map(str::to_owned).or_else(|| std::env::var(var).ok()))
    }

    /// Resolve with `lookup` standing in for the environment.
    ///
    /// # Errors
    ///
    /// Returns an error when a URL or the timeout does not parse.
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let api_base_url = parse_url("PORTAL_API_URL", get("PORTAL_API_URL").as_deref().unwrap_or(DEFAULT_API_URL))?;
        let auth_base_url =
            parse_url("PORTAL_AUTH_URL", get("PORTAL_AUTH_URL").as_deref().unwrap_or(DEFAULT_AUTH_URL))?;

        let public_url =
            parse_url("PORTAL_PUBLIC_URL", get("PORTAL_PUBLIC_URL").as_deref().unwrap_or(DEFAULT_PUBLIC_URL))?;

        let timeout_ms = match get("PORTAL_REQUEST_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                var: "PORTAL_REQUEST_TIMEOUT_MS",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        let cookie_secure = get("COOKIE_SECURE")
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or_else(|| auth_base_url.scheme() == "https");

        Ok(Self {
            api_base_url,
            auth_base_url,
            public_url,
            csrf_path: get("PORTAL_CSRF_PATH").unwrap_or_else(|| DEFAULT_CSRF_PATH.to_owned()),
            login_path: get("PORTAL_LOGIN_PATH").unwrap_or_else(|| DEFAULT_LOGIN_PATH.to_owned()),
            home_path: get("PORTAL_HOME_PATH").unwrap_or_else(|| DEFAULT_HOME_PATH.to_owned()),
            request_timeout: Duration::from_millis(timeout_ms),
            auth_cookie_name: get("PORTAL_AUTH_COOKIE").unwrap_or_else(|| DEFAULT_AUTH_COOKIE.to_owned()),
            cookie_secure,
        })
    }
}

/// Values baked in at compile time win over the runtime environment.
fn build_time(var: &str) -> Option<&'static str> {
    match var {
        "PORTAL_API_URL" => option_env!("PORTAL_API_URL"),
        "PORTAL_AUTH_URL" => option_env!("PORTAL_AUTH_URL"),
        _ => None,
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| ConfigError::Invalid {
        var,
        value: raw.to_owned(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid { var, value: raw.to_owned(), reason: "expected an http(s) URL".to_owned() });
    }
    Ok(url)
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
