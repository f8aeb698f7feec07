use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::admissions::DocumentType;

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_POOL_SEATS: u32 = 5_000;

/// Deployment stage the service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub admissions: AdmissionsConfig,
}

impl AppConfig {
    /// Read configuration from the process environment, after loading `.env` when present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(value) => LogFormat::parse(&value)?,
            Err(_) => LogFormat::Compact,
        };

        let required_documents = match env::var("APP_REQUIRED_DOCUMENTS") {
            Ok(value) => parse_document_list(&value)?,
            Err(_) => Vec::new(),
        };
        let store_lock_timeout = match env::var("APP_STORE_LOCK_TIMEOUT_MS") {
            Ok(value) => parse_lock_timeout(&value)?,
            Err(_) => Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        };
        let max_pool_seats = match env::var("APP_MAX_POOL_SEATS") {
            Ok(value) => parse_max_pool_seats(&value)?,
            Err(_) => DEFAULT_MAX_POOL_SEATS,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            admissions: AdmissionsConfig {
                required_documents,
                store_lock_timeout,
                max_pool_seats,
            },
        })
    }
}

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Full,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            _ => Err(ConfigError::InvalidLogFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Admission engine settings.
#[derive(Debug, Clone)]
pub struct AdmissionsConfig {
    /// Document types that must be verified and unflagged before `Submitted -> Verified`.
    /// Empty disables the gate.
    pub required_documents: Vec<DocumentType>,
    /// Upper bound on waiting for the store before a unit of work gives up.
    pub store_lock_timeout: Duration,
    /// Largest seat count a single pool may be configured with.
    pub max_pool_seats: u32,
}

impl Default for AdmissionsConfig {
    fn default() -> Self {
        Self {
            required_documents: Vec::new(),
            store_lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
            max_pool_seats: DEFAULT_MAX_POOL_SEATS,
        }
    }
}

fn parse_document_list(raw: &str) -> Result<Vec<DocumentType>, ConfigError> {
    let mut documents = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|entry| !entry.is_empty()) {
        let document_type = entry
            .parse::<DocumentType>()
            .map_err(|_| ConfigError::InvalidDocumentType(entry.to_string()))?;
        if !documents.contains(&document_type) {
            documents.push(document_type);
        }
    }
    Ok(documents)
}

fn parse_lock_timeout(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => Err(ConfigError::InvalidLockTimeout(raw.to_string())),
    }
}

fn parse_max_pool_seats(raw: &str) -> Result<u32, ConfigError> {
    match raw.trim().parse::<u32>() {
        Ok(seats) if seats > 0 => Ok(seats),
        _ => Err(ConfigError::InvalidMaxPoolSeats(raw.to_string())),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidDocumentType(String),
    InvalidLockTimeout(String),
    InvalidMaxPoolSeats(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'full', got '{value}'")
            }
            ConfigError::InvalidDocumentType(value) => {
                write!(f, "APP_REQUIRED_DOCUMENTS contains unknown document type '{value}'")
            }
            ConfigError::InvalidLockTimeout(value) => write!(
                f,
                "APP_STORE_LOCK_TIMEOUT_MS must be a positive number of milliseconds, got '{value}'"
            ),
            ConfigError::InvalidMaxPoolSeats(value) => write!(
                f,
                "APP_MAX_POOL_SEATS must be a positive seat count, got '{value}'"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
