use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Method, Request, StatusCode, Url};
use thiserror::Error;

use super::models::Student;
use crate::error::ClientError;
use crate::http_client::AuthenticatedClient;

#[derive(Error, Debug)]
pub enum StudentError {
    #[error("Student not found: {0}")]
    NotFound(i64),

    #[error("Unexpected status code from upstream API: {0}")]
    UnexpectedStatus(u16),

    #[error("Request to upstream API failed: {0}")]
    Upstream(#[from] ClientError),

    #[error("Failed to decode student response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid student URL: {0}")]
    InvalidUrl(String),
}

/// Lookup of students by id
pub trait StudentFinder: Send + Sync {
    fn get(&self, id: i64) -> impl Future<Output = Result<Student, StudentError>> + Send;
}

/// Upstream student API client
pub struct StudentClient {
    http: Arc<AuthenticatedClient>,
    api_url: String,

    /// Budget for one lookup, re-authentication included
    call_timeout: Duration,
}

impl StudentClient {
    pub fn new(
        http: Arc<AuthenticatedClient>,
        api_url: impl Into<String>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            call_timeout,
        }
    }

    fn student_url(&self, id: i64) -> Result<Url, StudentError> {
        let raw = format!("{}/students/{}", self.api_url.trim_end_matches('/'), id);
        Url::parse(&raw).map_err(|e| StudentError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    async fn fetch(&self, id: i64) -> Result<Student, StudentError> {
        let mut request = Request::new(Method::GET, self.student_url(id)?);
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .http
            .execute_with_timeout(request, self.call_timeout)
            .await?;

        match response.status {
            StatusCode::OK => Ok(response.json()?),
            StatusCode::NOT_FOUND => Err(StudentError::NotFound(id)),
            status => {
                tracing::warn!(
                    student_id = id,
                    status = status.as_u16(),
                    "Unexpected status from upstream student API"
                );
                Err(StudentError::UnexpectedStatus(status.as_u16()))
            }
        }
    }
}

impl StudentFinder for StudentClient {
    fn get(&self, id: i64) -> impl Future<Output = Result<Student, StudentError>> + Send {
        self.fetch(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{LoginSettings, MemoryCredentialStore, SessionManager};
    use reqwest::Client;
    use serde_json::json;

    async fn setup() -> (mockito::ServerGuard, StudentClient) {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_header("set-cookie", "accessToken=acc; Path=/")
            .with_header("set-cookie", "csrfToken=csrf; Path=/")
            .with_header("set-cookie", "refreshToken=ref; Path=/")
            .expect_at_least(1)
            .create_async()
            .await;

        let settings = LoginSettings {
            auth_url: server.url(),
            username: "svc".to_string(),
            password: "pw".to_string(),
            session_origin: Url::parse(&server.url()).unwrap(),
        };
        let sessions = Arc::new(SessionManager::new(
            settings,
            Client::new(),
            Arc::new(MemoryCredentialStore::new()),
        ));
        let http = Arc::new(AuthenticatedClient::new(Client::new(), sessions));
        let client = StudentClient::new(http, server.url(), Duration::from_secs(5));
        (server, client)
    }

    #[tokio::test]
    async fn test_get_student() {
        let (mut server, client) = setup().await;
        let mock = server
            .mock("GET", "/students/7")
            .match_header("authorization", "Bearer acc")
            .match_header("x-csrf-token", "csrf")
            .match_header(
                "cookie",
                "accessToken=acc; csrfToken=csrf; refreshToken=ref",
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"id": 7, "name": "Grace Hopper"}).to_string())
            .create_async()
            .await;

        let student = client.get(7).await.unwrap();
        assert_eq!(student.id, 7);
        assert_eq!(student.name.as_deref(), Some("Grace Hopper"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_slow_upstream_is_cancelled() {
        // Accepts connections but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let settings = LoginSettings {
            auth_url: url.clone(),
            username: "svc".to_string(),
            password: "pw".to_string(),
            session_origin: Url::parse(&url).unwrap(),
        };
        let sessions = Arc::new(SessionManager::new(
            settings,
            Client::new(),
            Arc::new(MemoryCredentialStore::new()),
        ));
        let http = Arc::new(AuthenticatedClient::new(Client::new(), sessions.clone()));
        let client = StudentClient::new(http, url, Duration::from_millis(100));

        let err = client.get(1).await.unwrap_err();
        assert!(matches!(
            err,
            StudentError::Upstream(ClientError::Cancelled)
        ));
        assert!(!sessions.has_session().await);
    }

    #[tokio::test]
    async fn test_not_found() {
        let (mut server, client) = setup().await;
        server
            .mock("GET", "/students/404")
            .with_status(404)
            .create_async()
            .await;

        let err = client.get(404).await.unwrap_err();
        assert!(matches!(err, StudentError::NotFound(404)));
    }

    #[tokio::test]
    async fn test_unexpected_status() {
        let (mut server, client) = setup().await;
        server
            .mock("GET", "/students/1")
            .with_status(502)
            .create_async()
            .await;

        let err = client.get(1).await.unwrap_err();
        assert!(matches!(err, StudentError::UnexpectedStatus(502)));
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let (mut server, client) = setup().await;
        server
            .mock("GET", "/students/1")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client.get(1).await.unwrap_err();
        assert!(matches!(err, StudentError::Decode(_)));
    }
}
