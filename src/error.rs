// Error handling module
// Defines the upstream client error taxonomy and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a login exchange did not produce a session.
///
/// Cloneable so that every caller waiting on the same login attempt can
/// receive the same outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    /// HTTP status of the login response, if one was received
    pub status: Option<u16>,
    pub message: String,
}

impl AuthFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "status={} {}", status, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors produced by the session manager and the authenticated executor
#[derive(Error, Debug)]
pub enum ClientError {
    /// No complete session is held. Retryable after backoff.
    #[error("Session credentials unavailable")]
    CredentialsUnavailable,

    /// The login exchange failed; any previous session is left in place
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(AuthFailure),

    /// Dispatch failed outright (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The caller's deadline elapsed before the call completed
    #[error("Request cancelled")]
    Cancelled,

    /// The request body is a stream and cannot be replayed
    #[error("Request body is not cloneable")]
    RequestNotCloneable,
}

impl From<AuthFailure> for ClientError {
    fn from(failure: AuthFailure) -> Self {
        ClientError::AuthenticationFailed(failure)
    }
}

/// Errors surfaced at the HTTP boundary
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed inbound request
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Internal server error; detail is logged, never returned
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for HTTP handlers
pub type Result<T> = std::result::Result<T, ApiError>;
