// Session types

use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, COOKIE};
use serde::{Deserialize, Serialize};

/// Store entry holding the access credential
pub const ACCESS_TOKEN: &str = "accessToken";
/// Store entry holding the anti-forgery credential
pub const CSRF_TOKEN: &str = "csrfToken";
/// Store entry holding the renewal credential
pub const REFRESH_TOKEN: &str = "refreshToken";

/// Names a login response must set for a session to be usable
pub const REQUIRED_CREDENTIALS: [&str; 3] = [ACCESS_TOKEN, CSRF_TOKEN, REFRESH_TOKEN];

/// Dedicated anti-forgery header
pub const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// Application error message the upstream uses to report a stale session
pub const TOKEN_EXPIRED_MESSAGE: &str = "Token expired";

/// Login request body
#[derive(Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Error body returned by the upstream API
#[derive(Deserialize)]
pub struct UpstreamErrorBody {
    #[serde(default)]
    pub error: String,
}

/// A complete authenticated session.
///
/// Only constructible with all three credentials present, non-empty and
/// valid as header values; the header set is built once so every attach
/// writes byte-identical values.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    headers: SessionHeaders,
}

#[derive(Clone, PartialEq, Eq)]
struct SessionHeaders {
    cookie: HeaderValue,
    authorization: HeaderValue,
    csrf: HeaderValue,
}

impl Session {
    /// Build a session from named store values, or `None` if any is missing
    pub fn from_values(values: &HashMap<String, String>) -> Option<Self> {
        let get = |name: &str| values.get(name).filter(|v| !v.is_empty());
        let access_token = get(ACCESS_TOKEN)?;
        let csrf_token = get(CSRF_TOKEN)?;
        let refresh_token = get(REFRESH_TOKEN)?;

        let cookie = HeaderValue::from_str(&format!(
            "{}={}; {}={}; {}={}",
            ACCESS_TOKEN, access_token, CSRF_TOKEN, csrf_token, REFRESH_TOKEN, refresh_token
        ))
        .ok()?;
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", access_token)).ok()?;
        authorization.set_sensitive(true);
        let csrf = HeaderValue::from_str(csrf_token).ok()?;

        Some(Self {
            headers: SessionHeaders {
                cookie,
                authorization,
                csrf,
            },
        })
    }

    /// Write the session's credential headers, replacing existing values
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(COOKIE, self.headers.cookie.clone());
        headers.insert(AUTHORIZATION, self.headers.authorization.clone());
        headers.insert(CSRF_HEADER, self.headers.csrf.clone());
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("csrf_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Names from `REQUIRED_CREDENTIALS` absent (or empty) in `values`
pub fn missing_credentials(values: &HashMap<String, String>) -> Vec<&'static str> {
    REQUIRED_CREDENTIALS
        .iter()
        .copied()
        .filter(|name| values.get(*name).map_or(true, |v| v.is_empty()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_complete_session_headers() {
        let session = Session::from_values(&values(&[
            ("accessToken", "acc"),
            ("csrfToken", "csrf"),
            ("refreshToken", "ref"),
        ]))
        .unwrap();

        let mut headers = HeaderMap::new();
        session.apply(&mut headers);

        assert_eq!(
            headers.get(COOKIE).unwrap(),
            "accessToken=acc; csrfToken=csrf; refreshToken=ref"
        );
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer acc");
        assert_eq!(headers.get("X-CSRF-Token").unwrap(), "csrf");
    }

    #[test]
    fn test_partial_session_rejected() {
        let partial = values(&[("accessToken", "acc"), ("refreshToken", "ref")]);
        assert!(Session::from_values(&partial).is_none());
        assert_eq!(missing_credentials(&partial), vec!["csrfToken"]);
    }

    #[test]
    fn test_empty_value_rejected() {
        let empty = values(&[
            ("accessToken", "acc"),
            ("csrfToken", ""),
            ("refreshToken", "ref"),
        ]);
        assert!(Session::from_values(&empty).is_none());
        assert_eq!(missing_credentials(&empty), vec!["csrfToken"]);
    }

    #[test]
    fn test_invalid_header_value_rejected() {
        let bad = values(&[
            ("accessToken", "acc\nInjected: yes"),
            ("csrfToken", "csrf"),
            ("refreshToken", "ref"),
        ]);
        assert!(Session::from_values(&bad).is_none());
    }

    #[test]
    fn test_apply_replaces_existing_headers() {
        let session = Session::from_values(&values(&[
            ("accessToken", "new"),
            ("csrfToken", "csrf"),
            ("refreshToken", "ref"),
        ]))
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer old"));
        session.apply(&mut headers);

        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer new");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let session = Session::from_values(&values(&[
            ("accessToken", "secret-access"),
            ("csrfToken", "secret-csrf"),
            ("refreshToken", "secret-refresh"),
        ]))
        .unwrap();

        let rendered = format!("{:?}", session);
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_login_request_wire_format() {
        let body = serde_json::to_value(LoginRequest {
            username: "svc@example.com",
            password: "pw",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"username": "svc@example.com", "password": "pw"})
        );
    }
}
