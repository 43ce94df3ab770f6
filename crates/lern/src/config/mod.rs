use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::domain::{OrganizationId, UserId};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub context: AppContext,
    pub suggestions: SuggestionConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let org_id = non_empty_var("LERN_ORG_ID", AppContext::DEFAULT_ORG_ID)?;
        let educator_id = non_empty_var("LERN_EDUCATOR_ID", AppContext::DEFAULT_EDUCATOR_ID)?;

        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| SuggestionConfig::DEFAULT_BASE_URL.to_string());
        let model =
            env::var("OPENAI_MODEL").unwrap_or_else(|_| SuggestionConfig::DEFAULT_MODEL.to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            context: AppContext {
                org_id: OrganizationId::new(org_id),
                educator_id: UserId::new(educator_id),
            },
            suggestions: SuggestionConfig {
                api_key,
                base_url: base_url.trim_end_matches('/').to_string(),
                model,
            },
        })
    }
}

fn non_empty_var(name: &'static str, default: &str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue { name }),
        Ok(value) => Ok(value.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Organization and acting educator that writes are attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppContext {
    pub org_id: OrganizationId,
    pub educator_id: UserId,
}

impl AppContext {
    pub const DEFAULT_ORG_ID: &'static str = "org-demo";
    pub const DEFAULT_EDUCATOR_ID: &'static str = "educator-1";
}

impl Default for AppContext {
    fn default() -> Self {
        Self {
            org_id: OrganizationId::from(Self::DEFAULT_ORG_ID),
            educator_id: UserId::from(Self::DEFAULT_EDUCATOR_ID),
        }
    }
}

/// Chat-completions endpoint used for transcript analysis.
#[derive(Debug, Clone)]
pub struct SuggestionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

impl SuggestionConfig {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com/v1";
    pub const DEFAULT_MODEL: &'static str = "gpt-4o-mini";
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    EmptyValue { name: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::EmptyValue { name } => write!(f, "{name} must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::EmptyValue { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
