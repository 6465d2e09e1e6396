use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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

/// Top-level configuration for the relay.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    /// `None` when no partner endpoint is configured; leads are then only stored.
    pub partner: Option<PartnerConfig>,
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
        let cors_allowed_origins =
            parse_origins(&env::var("APP_CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat { value: raw })?,
            Err(_) => LogFormat::Compact,
        };

        let leads_file = env::var("LEADS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("leads.csv"));

        let partner = match env::var("PARTNER_API_URL") {
            Ok(endpoint) if !endpoint.trim().is_empty() => Some(PartnerConfig::from_env(endpoint)?),
            _ => None,
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                cors_allowed_origins,
            },
            telemetry: TelemetryConfig {
                log_level,
                format: log_format,
            },
            store: StoreConfig { leads_file },
            partner,
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the relay from a browser; `*` admits any origin.
    pub cors_allowed_origins: Vec<String>,
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

/// Tracing output controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Location of the spreadsheet file backing the lead store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub leads_file: PathBuf,
}

/// Outbound partner API settings.
#[derive(Debug, Clone)]
pub struct PartnerConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl PartnerConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    fn from_env(endpoint: String) -> Result<Self, ConfigError> {
        let endpoint = endpoint.trim().to_string();
        url::Url::parse(&endpoint).map_err(|source| ConfigError::InvalidPartnerUrl {
            value: endpoint.clone(),
            source,
        })?;

        let api_key = env::var("PARTNER_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let timeout = match env::var("PARTNER_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidPartnerTimeout)?,
            Err(_) => Self::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            endpoint,
            api_key,
            timeout,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidLogFormat {
        value: String,
    },
    InvalidPartnerUrl {
        value: String,
        source: url::ParseError,
    },
    InvalidPartnerTimeout,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat { value } => {
                write!(f, "APP_LOG_FORMAT '{value}' must be 'compact' or 'json'")
            }
            ConfigError::InvalidPartnerUrl { value, .. } => {
                write!(f, "PARTNER_API_URL '{value}' is not a valid URL")
            }
            ConfigError::InvalidPartnerTimeout => {
                write!(f, "PARTNER_TIMEOUT_SECS must be a positive number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPartnerUrl { source, .. } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat { .. }
            | ConfigError::InvalidPartnerTimeout => None,
        }
    }
}
