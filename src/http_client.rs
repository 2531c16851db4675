use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::auth::{SessionManager, UpstreamErrorBody, TOKEN_EXPIRED_MESSAGE};
use crate::error::ClientError;

/// Re-authentication cycles allowed per call
pub const MAX_REAUTHENTICATIONS: u32 = 1;

/// Outbound dispatch capability
///
/// Implementations must keep a per-origin cookie store across calls when
/// the upstream rotates cookies.
pub trait Dispatch: Send + Sync {
    fn dispatch(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send;
}

impl Dispatch for Client {
    fn dispatch(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        self.execute(request)
    }
}

impl<T: Dispatch> Dispatch for Arc<T> {
    fn dispatch(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, reqwest::Error>> + Send {
        self.as_ref().dispatch(request)
    }
}

/// Fully buffered upstream response
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub url: Url,
    pub body: Bytes,
}

impl UpstreamResponse {
    async fn read(response: Response) -> Result<Self, reqwest::Error> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            url,
            body,
        })
    }

    /// Whether this is the upstream's stale-session signal:
    /// `400` with `{"error": "Token expired"}`
    pub fn is_token_expired(&self) -> bool {
        self.status == StatusCode::BAD_REQUEST
            && serde_json::from_slice::<UpstreamErrorBody>(&self.body)
                .map(|body| body.error == TOKEN_EXPIRED_MESSAGE)
                .unwrap_or(false)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// HTTP client for the upstream API with transparent re-authentication
///
/// Handles:
/// - no session: logs in before the first dispatch
/// - `400 Token expired`: logs in again and redispatches once
pub struct AuthenticatedClient<D = Client> {
    dispatcher: D,

    sessions: Arc<SessionManager>,
}

impl<D: Dispatch> AuthenticatedClient<D> {
    pub fn new(dispatcher: D, sessions: Arc<SessionManager>) -> Self {
        Self {
            dispatcher,
            sessions,
        }
    }

    /// Execute a request with credentials attached.
    ///
    /// The caller's request is never mutated; each attempt dispatches a clone.
    /// Non-expiry responses are returned as-is whatever their status.
    pub async fn execute(&self, request: Request) -> Result<UpstreamResponse, ClientError> {
        let method = request.method().clone();
        let url = request.url().clone();
        let mut attempt: u32 = 0;

        tracing::debug!(method = %method, url = %url, "Sending upstream request");

        loop {
            let mut req = request
                .try_clone()
                .ok_or(ClientError::RequestNotCloneable)?;

            let epoch = if attempt == 0 {
                self.attach_or_authenticate(req.headers_mut()).await?
            } else {
                let (epoch, attached) = self.sessions.attach_tracked(req.headers_mut()).await;
                attached?;
                epoch
            };

            tracing::debug!(attempt = attempt + 1, epoch, "Executing request attempt");

            let response = self.dispatcher.dispatch(req).await.map_err(|e| {
                tracing::warn!(error = %e, url = %url, attempt = attempt + 1, "Upstream request error");
                ClientError::Transport(e)
            })?;
            let response = UpstreamResponse::read(response).await?;

            tracing::debug!(status = %response.status, "Received upstream response");

            if !response.is_token_expired() {
                return Ok(response);
            }

            if attempt >= MAX_REAUTHENTICATIONS {
                tracing::warn!(
                    url = %url,
                    attempts = attempt + 1,
                    "Session still expired after re-authentication, giving up"
                );
                return Ok(response);
            }

            tracing::warn!(url = %url, epoch, "Upstream reported expired session, re-authenticating");
            drop(response);
            self.sessions.refresh(epoch).await?;
            attempt += 1;
        }
    }

    /// Execute with a deadline covering login and dispatch.
    ///
    /// On elapse the in-flight work is dropped, which releases any session
    /// lock it held.
    pub async fn execute_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<UpstreamResponse, ClientError> {
        tokio::time::timeout(timeout, self.execute(request))
            .await
            .map_err(|_| ClientError::Cancelled)?
    }

    /// Attach credentials, logging in first if no session is held.
    /// Returns the session epoch the attached credentials belong to.
    async fn attach_or_authenticate(&self, headers: &mut HeaderMap) -> Result<u64, ClientError> {
        let (epoch, attached) = self.sessions.attach_tracked(headers).await;
        match attached {
            Ok(()) => Ok(epoch),
            Err(ClientError::CredentialsUnavailable) => {
                tracing::info!("No upstream session, authenticating before dispatch");
                self.sessions.refresh(epoch).await?;
                let (epoch, attached) = self.sessions.attach_tracked(headers).await;
                attached.map(|()| epoch)
            }
            Err(e) => Err(e),
        }
    }
}
