use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Url;

/// Report Gateway - reports over an authenticated upstream API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Base URL of the upstream data API
    #[arg(long, env = "UPSTREAM_API_URL")]
    pub api_url: String,

    /// Base URL of the upstream authentication service
    #[arg(long, env = "UPSTREAM_AUTH_URL")]
    pub auth_url: String,

    /// Login username for the upstream API
    #[arg(short = 'u', long, env = "UPSTREAM_USERNAME")]
    pub username: String,

    /// Login password for the upstream API
    #[arg(long, env = "UPSTREAM_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// URL whose origin scopes session cookies (defaults to the auth URL)
    #[arg(long, env = "SESSION_HOST")]
    pub session_host: Option<String>,

    /// Upstream HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "10")]
    pub http_timeout: u64,

    /// Budget in seconds for one upstream lookup, re-authentication included
    #[arg(long, env = "UPSTREAM_CALL_TIMEOUT", default_value = "12")]
    pub call_timeout: u64,

    /// Deployment environment (development, production)
    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    // Upstream API
    pub api_url: String,
    pub auth_url: String,
    pub username: String,
    pub password: String,
    pub session_host: String,

    // HTTP client
    pub http_request_timeout: u64,
    pub upstream_call_timeout: u64,

    // Logging
    pub environment: Environment,
    pub log_level: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration with priority: CLI > ENV > defaults
    pub fn load() -> Result<Self> {
        // A missing .env file is fine; real deployments set the environment
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        Ok(Self::from_args(args))
    }

    fn from_args(args: CliArgs) -> Self {
        let session_host = args
            .session_host
            .unwrap_or_else(|| args.auth_url.clone());

        Config {
            server_host: args.host,
            server_port: args.port,
            api_url: args.api_url.trim_end_matches('/').to_string(),
            auth_url: args.auth_url,
            username: args.username,
            password: args.password,
            session_host,
            http_request_timeout: args.http_timeout,
            upstream_call_timeout: args.call_timeout,
            environment: parse_environment(&args.environment),
            log_level: args.log_level,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_url)
            .with_context(|| format!("UPSTREAM_API_URL is not a valid URL: {}", self.api_url))?;
        Url::parse(&self.auth_url)
            .with_context(|| format!("UPSTREAM_AUTH_URL is not a valid URL: {}", self.auth_url))?;
        self.session_origin()?;

        if self.username.trim().is_empty() {
            anyhow::bail!("UPSTREAM_USERNAME cannot be empty");
        }
        if self.password.is_empty() {
            anyhow::bail!("UPSTREAM_PASSWORD cannot be empty");
        }
        if self.upstream_call_timeout == 0 {
            anyhow::bail!("UPSTREAM_CALL_TIMEOUT must be at least 1 second");
        }

        Ok(())
    }

    /// URL whose origin scopes the session credentials
    pub fn session_origin(&self) -> Result<Url> {
        Url::parse(&self.session_host)
            .with_context(|| format!("SESSION_HOST is not a valid URL: {}", self.session_host))
    }
}

/// Parse environment from string
fn parse_environment(s: &str) -> Environment {
    match s.to_lowercase().as_str() {
        "production" | "prod" => Environment::Production,
        _ => Environment::Development,
    }
}
