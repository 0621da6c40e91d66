use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::lending::scoring::ScoringConfig;

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
    pub lending: LendingConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            lending: LendingConfig::from_env()?,
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Lending policy dials shared by the scoring, offer, and lifecycle services.
#[derive(Debug, Clone, PartialEq)]
pub struct LendingConfig {
    /// How far back transactions are fetched when refreshing a score.
    pub lookback_days: i64,
    /// Largest principal a lender may publish in a single offer.
    pub max_offer_principal: u64,
    /// Attempts at creating the active loan once a request has been approved.
    pub active_loan_attempts: u8,
    pub scoring: ScoringConfig,
}

const DEFAULT_LOOKBACK_DAYS: i64 = 180;
const DEFAULT_MAX_OFFER_PRINCIPAL: u64 = 50_000;
const DEFAULT_ACTIVE_LOAN_ATTEMPTS: u8 = 3;

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_offer_principal: DEFAULT_MAX_OFFER_PRINCIPAL,
            active_loan_attempts: DEFAULT_ACTIVE_LOAN_ATTEMPTS,
            scoring: ScoringConfig::default(),
        }
    }
}

impl LendingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let lookback_days = env_number("SARRAL_LOOKBACK_DAYS", defaults.lookback_days)?;
        if lookback_days <= 0 {
            return Err(ConfigError::InvalidNumber {
                key: "SARRAL_LOOKBACK_DAYS",
            });
        }

        let month_divisor = env_number("SARRAL_MONTH_DIVISOR", defaults.scoring.month_divisor)?;
        if month_divisor == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "SARRAL_MONTH_DIVISOR",
            });
        }

        let attempts = env_number("SARRAL_ACTIVE_LOAN_ATTEMPTS", defaults.active_loan_attempts)?;

        Ok(Self {
            lookback_days,
            max_offer_principal: env_number(
                "SARRAL_MAX_OFFER_PRINCIPAL",
                defaults.max_offer_principal,
            )?,
            active_loan_attempts: attempts.max(1),
            scoring: ScoringConfig {
                month_divisor,
                ..defaults.scoring
            },
        })
    }
}

fn env_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => {
                write!(f, "{key} must be a positive whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
