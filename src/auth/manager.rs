use std::collections::HashMap;
use std::sync::Arc;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use tokio::sync::RwLock;

use super::credentials::CredentialStore;
use super::types::{missing_credentials, LoginRequest, Session, REQUIRED_CREDENTIALS};
use crate::error::{AuthFailure, ClientError};

/// Longest slice of a failed login body kept in the error
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// Login exchange settings
#[derive(Debug, Clone)]
pub struct LoginSettings {
    /// Base URL of the authentication service; `/auth/login` is appended
    pub auth_url: String,
    pub username: String,
    pub password: String,
    /// URL whose origin scopes the session credentials in the store
    pub session_origin: Url,
}

impl LoginSettings {
    fn login_url(&self) -> String {
        format!("{}/auth/login", self.auth_url.trim_end_matches('/'))
    }
}

/// Session state guarded by the manager's lock
#[derive(Default)]
struct SessionState {
    session: Option<Session>,

    /// Number of completed authentication attempts
    epoch: u64,

    /// Outcome of the attempt that produced `epoch`
    last_outcome: Option<Result<(), AuthFailure>>,
}

/// Session manager
/// Owns the upstream session and the single login operation that produces it
pub struct SessionManager {
    state: RwLock<SessionState>,

    /// HTTP client for the login exchange
    client: Client,

    /// Where login responses deposit credentials
    store: Arc<dyn CredentialStore>,

    settings: LoginSettings,
}

impl SessionManager {
    /// `client` carries only the login exchange. Give it no cookie provider:
    /// a rejected or partial login must not leak cookies into `store`.
    pub fn new(settings: LoginSettings, client: Client, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            client,
            store,
            settings,
        }
    }

    /// Perform the login exchange and replace the current session.
    ///
    /// Holds the write lock for the whole round trip, so concurrent callers
    /// queue behind it and attach-reads wait for the new session. A failure
    /// leaves the previous session in place.
    pub async fn authenticate(&self) -> Result<(), ClientError> {
        let mut state = self.state.write().await;
        self.authenticate_locked(&mut state).await
    }

    /// Re-authenticate unless another caller already finished an attempt
    /// since `seen_epoch`, in which case that attempt's outcome is returned.
    pub async fn refresh(&self, seen_epoch: u64) -> Result<(), ClientError> {
        let mut state = self.state.write().await;

        if state.epoch != seen_epoch {
            tracing::debug!(
                seen_epoch,
                epoch = state.epoch,
                "Session already refreshed by a concurrent caller"
            );
            return match &state.last_outcome {
                Some(Err(failure)) => Err(failure.clone().into()),
                _ => Ok(()),
            };
        }

        self.authenticate_locked(&mut state).await
    }

    async fn authenticate_locked(&self, state: &mut SessionState) -> Result<(), ClientError> {
        // State is only touched after the exchange completes, so a dropped
        // future leaves the previous session and epoch intact.
        let outcome = self.login().await;

        state.epoch += 1;
        match outcome {
            Ok(session) => {
                state.session = Some(session);
                state.last_outcome = Some(Ok(()));
                tracing::info!(epoch = state.epoch, "Authenticated against upstream API");
                Ok(())
            }
            Err(failure) => {
                state.last_outcome = Some(Err(failure.clone()));
                tracing::warn!(epoch = state.epoch, error = %failure, "Upstream authentication failed");
                Err(failure.into())
            }
        }
    }

    /// Login round trip
    async fn login(&self) -> Result<Session, AuthFailure> {
        let url = self.settings.login_url();
        tracing::debug!(url = %url, "Logging in to upstream API");

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .json(&LoginRequest {
                username: &self.settings.username,
                password: &self.settings.password,
            })
            .send()
            .await
            .map_err(|e| AuthFailure::new(None, format!("login request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            return Err(AuthFailure::new(
                Some(status.as_u16()),
                format!("login rejected: {}", body),
            ));
        }

        // Only cookies issued by this response count; values left in the
        // store by an earlier login must not fill the gaps.
        let issued: HashMap<String, String> = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();

        let missing = missing_credentials(&issued);
        if !missing.is_empty() {
            tracing::warn!(?missing, "Login succeeded but session credentials are missing");
            return Err(AuthFailure::new(
                Some(status.as_u16()),
                format!("missing session credentials: {}", missing.join(", ")),
            ));
        }

        let pairs: Vec<(String, String)> = issued
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        self.store.set(response.url(), &pairs);

        // The new triple must be what the store now serves for the session origin
        let stored = self.store.get(&self.settings.session_origin);
        let visible = REQUIRED_CREDENTIALS
            .iter()
            .all(|name| stored.get(*name) == issued.get(*name));
        if !visible {
            tracing::warn!(
                origin = %self.settings.session_origin,
                login_url = %response.url(),
                "Session credentials are not visible at the session origin"
            );
            return Err(AuthFailure::new(
                Some(status.as_u16()),
                format!(
                    "session credentials not visible at {}",
                    self.settings.session_origin
                ),
            ));
        }

        Session::from_values(&issued).ok_or_else(|| {
            AuthFailure::new(
                Some(status.as_u16()),
                "session credentials are not valid header values".to_string(),
            )
        })
    }

    /// Set the credential headers on an outgoing request.
    ///
    /// Never mutates session state.
    pub async fn attach_credentials(&self, headers: &mut HeaderMap) -> Result<(), ClientError> {
        self.attach_tracked(headers).await.1
    }

    /// Attach credentials and report the epoch the attach observed
    pub(crate) async fn attach_tracked(
        &self,
        headers: &mut HeaderMap,
    ) -> (u64, Result<(), ClientError>) {
        let state = self.state.read().await;
        match &state.session {
            Some(session) => {
                // Cookies rotated on proxied responses supersede the login snapshot
                match Session::from_values(&self.store.get(&self.settings.session_origin)) {
                    Some(current) => current.apply(headers),
                    None => session.apply(headers),
                }
                (state.epoch, Ok(()))
            }
            None => {
                tracing::debug!(epoch = state.epoch, "No session available to attach");
                (state.epoch, Err(ClientError::CredentialsUnavailable))
            }
        }
    }

    /// Whether a complete session is currently held
    pub async fn has_session(&self) -> bool {
        self.state.read().await.session.is_some()
    }
}
