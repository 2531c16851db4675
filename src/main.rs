use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use report_gateway::auth::{CookieJarStore, LoginSettings, SessionManager};
use report_gateway::config::{Config, Environment};
use report_gateway::http_client::AuthenticatedClient;
use report_gateway::routes::{self, AppState};
use report_gateway::student::{ReportService, StudentClient, TextReportRenderer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::info!("Report Gateway starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    // Proxied calls share the credential jar so rotated cookies are kept.
    // Login gets its own jar-less client; only a complete login is recorded.
    let store = CookieJarStore::new();
    let timeout = Duration::from_secs(config.http_request_timeout);
    let client = reqwest::Client::builder()
        .cookie_provider(store.jar())
        .timeout(timeout)
        .build()
        .context("Failed to create HTTP client")?;
    let login_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to create login HTTP client")?;

    let settings = LoginSettings {
        auth_url: config.auth_url.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
        session_origin: config.session_origin()?,
    };
    let sessions = Arc::new(SessionManager::new(
        settings,
        login_client,
        Arc::new(store),
    ));

    // Warm-up login; the first report request retries if this fails
    tracing::info!("Authenticating against upstream API...");
    match sessions.authenticate().await {
        Ok(()) => tracing::info!("Initial authentication successful"),
        Err(e) => tracing::warn!(
            error = %e,
            "Initial authentication failed, will retry on first request"
        ),
    }

    let http_client = Arc::new(AuthenticatedClient::new(client, sessions.clone()));
    let reports = Arc::new(ReportService::new(
        StudentClient::new(
            http_client,
            config.api_url.clone(),
            Duration::from_secs(config.upstream_call_timeout),
        ),
        TextReportRenderer,
    ));

    let app = routes::build_router(AppState { reports, sessions });

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Initialize logging; `RUST_LOG` overrides the configured level
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false);

    match config.environment {
        Environment::Development => builder.with_file(true).with_line_number(true).init(),
        Environment::Production => builder.json().init(),
    }
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
