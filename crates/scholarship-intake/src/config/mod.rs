use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "https://se.formularios.loprado.cl",
    "https://formulariosloprado.cl",
];

const DEFAULT_UPLOAD_MAX_BYTES: u64 = 5_000_000;

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
    pub cors: CorsConfig,
    pub uploads: UploadConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .or_else(|_| env::var("PORT"))
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let allowed_origins = match env::var("ALLOWED_ORIGINS") {
            Ok(raw) => parse_origin_list(&raw),
            Err(_) => DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
        };

        let directory = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let max_file_bytes = match env::var("UPLOAD_MAX_BYTES") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidSize("UPLOAD_MAX_BYTES"))?,
            Err(_) => DEFAULT_UPLOAD_MAX_BYTES,
        };
        let retain_failed = read_flag("UPLOAD_RETAIN_FAILED")?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            cors: CorsConfig { allowed_origins },
            uploads: UploadConfig {
                directory,
                max_file_bytes,
                retain_failed,
            },
        })
    }
}

fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn read_flag(name: &'static str) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(ConfigError::InvalidFlag(name)),
        },
        Err(_) => Ok(false),
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(name)),
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

/// Browser origins permitted to post submissions.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

/// Where multipart file parts are staged and how large they may be.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub directory: PathBuf,
    pub max_file_bytes: u64,
    /// Keep a staged file on disk when its remote upload fails.
    pub retain_failed: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("uploads"),
            max_file_bytes: DEFAULT_UPLOAD_MAX_BYTES,
            retain_failed: false,
        }
    }
}

/// Credentials and identifiers for the spreadsheet and Drive backends.
#[derive(Clone)]
pub struct GoogleConfig {
    pub spreadsheet_id: String,
    pub client_email: String,
    pub private_key: String,
    pub drive_parent_folder_id: String,
}

impl GoogleConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let spreadsheet_id = require_var("GOOGLE_SHEETS_SPREADSHEET_ID")?;
        let client_email = require_var("GOOGLE_CLOUD_CLIENT_EMAIL")?;
        // Keys pasted into .env files carry escaped newlines.
        let private_key = require_var("GOOGLE_CLOUD_PRIVATE_KEY")?.replace("\\n", "\n");
        let drive_parent_folder_id = require_var("GOOGLE_DRIVE_FOLDER_ID")?;

        Ok(Self {
            spreadsheet_id,
            client_email,
            private_key,
            drive_parent_folder_id,
        })
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("client_email", &self.client_email)
            .field("drive_parent_folder_id", &self.drive_parent_folder_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSize(&'static str),
    InvalidFlag(&'static str),
    MissingVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT/PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSize(name) => write!(f, "{name} must be a byte count"),
            ConfigError::InvalidFlag(name) => write!(f, "{name} must be true or false"),
            ConfigError::MissingVar(name) => write!(f, "{name} is not configured"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSize(_)
            | ConfigError::InvalidFlag(_)
            | ConfigError::MissingVar(_) => None,
        }
    }
}
