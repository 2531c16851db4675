// Authentication module
// Manages the upstream session lifecycle and credential storage

mod credentials;
mod manager;
mod types;

pub use credentials::{CookieJarStore, CredentialStore, MemoryCredentialStore};
pub use manager::{LoginSettings, SessionManager};
pub use types::{
    Session, UpstreamErrorBody, ACCESS_TOKEN, CSRF_HEADER, CSRF_TOKEN, REFRESH_TOKEN,
    TOKEN_EXPIRED_MESSAGE,
};
