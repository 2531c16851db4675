// Credential stores keyed by target origin

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::Url;

/// Per-origin storage for named credential values
///
/// Values stored for one host are never visible under another.
pub trait CredentialStore: Send + Sync {
    /// All named values currently held for `origin`
    fn get(&self, origin: &Url) -> HashMap<String, String>;

    /// Store named values for `origin`, replacing same-named entries
    fn set(&self, origin: &Url, values: &[(String, String)]);
}

/// Credential store backed by a reqwest cookie jar
///
/// Hand the same jar to the dispatching client with
/// `ClientBuilder::cookie_provider` so cookies set on proxied calls land here too.
#[derive(Clone, Default)]
pub struct CookieJarStore {
    jar: Arc<Jar>,
}

impl CookieJarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }
}

impl CredentialStore for CookieJarStore {
    fn get(&self, origin: &Url) -> HashMap<String, String> {
        self.jar
            .cookies(origin)
            .and_then(|header| header.to_str().ok().map(parse_cookie_header))
            .unwrap_or_default()
    }

    fn set(&self, origin: &Url, values: &[(String, String)]) {
        for (name, value) in values {
            self.jar
                .add_cookie_str(&format!("{}={}; Path=/", name, value), origin);
        }
    }
}

/// In-memory credential store
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, origin: &Url) -> HashMap<String, String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&origin.origin().ascii_serialization())
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, origin: &Url, values: &[(String, String)]) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = entries
            .entry(origin.origin().ascii_serialization())
            .or_default();
        for (name, value) in values {
            slot.insert(name.clone(), value.clone());
        }
    }
}

/// Parse a `Cookie` request header (`a=1; b=2`) into a map
fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header.split(';').filter_map(parse_cookie_pair).collect()
}

fn parse_cookie_pair(pair: &str) -> Option<(String, String)> {
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim();
    // RFC 6265 allows a DQUOTE-wrapped cookie-value
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    Some((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_cookie_header() {
        let parsed = parse_cookie_header("accessToken=a; csrfToken=b;refreshToken=c");
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed["accessToken"], "a");
        assert_eq!(parsed["refreshToken"], "c");
    }

    #[test]
    fn test_parse_cookie_header_unquotes_values() {
        let parsed = parse_cookie_header("csrfToken=\"xyz\"; garbage; =orphan");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["csrfToken"], "xyz");
    }

    #[test]
    fn test_value_may_contain_equals() {
        let parsed = parse_cookie_header("accessToken=eyJ0==");
        assert_eq!(parsed["accessToken"], "eyJ0==");
    }

    #[test]
    fn test_memory_store_isolates_origins() {
        let store = MemoryCredentialStore::new();
        store.set(
            &url("http://auth.internal:3000/auth/login"),
            &pairs(&[("accessToken", "a")]),
        );

        let same = store.get(&url("http://auth.internal:3000/students/1"));
        assert_eq!(same.get("accessToken").map(String::as_str), Some("a"));

        assert!(store.get(&url("http://other.internal:3000/")).is_empty());
        assert!(store.get(&url("http://auth.internal:4000/")).is_empty());
    }

    #[test]
    fn test_memory_store_replaces_same_name() {
        let store = MemoryCredentialStore::new();
        let origin = url("http://auth.internal/");
        store.set(&origin, &pairs(&[("accessToken", "old"), ("csrfToken", "c")]));
        store.set(&origin, &pairs(&[("accessToken", "new")]));

        let values = store.get(&origin);
        assert_eq!(values["accessToken"], "new");
        assert_eq!(values["csrfToken"], "c");
    }

    #[test]
    fn test_cookie_jar_store_round_trip() {
        let store = CookieJarStore::new();
        let origin = url("http://auth.internal/auth/login");
        store.set(
            &origin,
            &pairs(&[("accessToken", "a"), ("csrfToken", "c"), ("refreshToken", "r")]),
        );

        let values = store.get(&url("http://auth.internal/"));
        assert_eq!(values["accessToken"], "a");
        assert_eq!(values["csrfToken"], "c");
        assert_eq!(values["refreshToken"], "r");

        assert!(store.get(&url("http://elsewhere.internal/")).is_empty());
    }

    #[test]
    fn test_cookie_jar_store_sees_rotated_cookie() {
        let store = CookieJarStore::new();
        let origin = url("http://api.internal/");
        store.set(
            &origin,
            &pairs(&[("accessToken", "a"), ("csrfToken", "c"), ("refreshToken", "r")]),
        );

        // What the client does with a Set-Cookie on a proxied response
        store
            .jar()
            .add_cookie_str("accessToken=rotated; Path=/; HttpOnly", &url("http://api.internal/students/1"));

        let values = store.get(&origin);
        assert_eq!(values["accessToken"], "rotated");
        assert_eq!(values["csrfToken"], "c");
    }

    proptest! {
        #[test]
        fn prop_cookie_header_parses_every_pair(
            entries in proptest::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,8}", "[a-zA-Z0-9._-]{0,16}", 0..6)
        ) {
            let header = entries
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; ");

            let parsed = parse_cookie_header(&header);
            prop_assert_eq!(parsed.len(), entries.len());
            for (k, v) in &entries {
                prop_assert_eq!(parsed.get(k), Some(v));
            }
        }
    }
}
