use std::{env, fmt, net::SocketAddr, time::Duration};

use gha_relay_core::{parse_receiver_repos, ReceiverParseError, ReceiverRepo};
use url::Url;

use super::server_bind_address;

pub const DEFAULT_SLACK_API_BASE_URL: &str = "https://slack.com/api/";
pub const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com/";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Credential value that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the raw value; keep it out of logs.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub slack_signing_secret: Secret,
    pub slack_access_token: Secret,
    pub gha_repo_token: Secret,
    pub receivers: Vec<ReceiverRepo>,
    pub slack_api_base_url: Url,
    pub github_api_base_url: Url,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let slack_signing_secret = Secret::new(required("SLACK_SIGNING_SECRET")?);
        let slack_access_token = Secret::new(required("SLACK_ACCESS_TOKEN")?);
        let gha_repo_token = Secret::new(required("GHA_REPO_TOKEN")?);
        let receivers =
            parse_receiver_repos(&required("GHA_REPOS")?).map_err(ConfigError::Receivers)?;

        let slack_api_base_url = base_url("SLACK_API_BASE_URL", DEFAULT_SLACK_API_BASE_URL)?;
        let github_api_base_url = base_url("GITHUB_API_BASE_URL", DEFAULT_GITHUB_API_BASE_URL)?;
        let request_timeout = request_timeout()?;

        Ok(Self {
            bind_addr,
            environment,
            slack_signing_secret,
            slack_access_token,
            gha_repo_token,
            receivers,
            slack_api_base_url,
            github_api_base_url,
            request_timeout,
        })
    }
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Parses a base URL, adding the trailing slash `Url::join` needs to keep the last segment.
fn base_url(name: &'static str, default: &str) -> Result<Url, ConfigError> {
    let mut value = optional(name).unwrap_or_else(|| default.to_string());
    if !value.ends_with('/') {
        value.push('/');
    }
    Url::parse(&value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn request_timeout() -> Result<Duration, ConfigError> {
    let Some(value) = optional("REQUEST_TIMEOUT_SECS") else {
        return Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
    };
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidTimeout(value)),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    Missing(&'static str),
    InvalidUrl {
        name: &'static str,
        source: url::ParseError,
    },
    InvalidTimeout(String),
    Receivers(ReceiverParseError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::Missing(name) => write!(f, "{name} must be set"),
            Self::InvalidUrl { name, source } => write!(f, "invalid {name} value: {source}"),
            Self::InvalidTimeout(value) => write!(
                f,
                "REQUEST_TIMEOUT_SECS must be a positive number of seconds (got {value})"
            ),
            Self::Receivers(err) => write!(f, "invalid GHA_REPOS value: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BindAddress(err) => Some(err),
            Self::InvalidUrl { source, .. } => Some(source),
            Self::Receivers(err) => Some(err),
            _ => None,
        }
    }
}
