//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// JSON file holding the car and track catalog
    pub data_file: PathBuf,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,

    /// Period between two race ticks
    pub tick_period: Duration,
    /// Accelerate requests accepted per race per second
    pub accelerate_rate_limit: u32,
    /// Upper bound on a single HTTP request
    pub request_timeout: Duration,
    /// How long a finished race stays readable before it is dropped
    pub finished_race_retention: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let server_addr = if let Some(port) = lookup("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string())
        };

        let tick_millis = parse_positive(&lookup, "TICK_MILLIS", 1000)?;
        let accelerate_rate_limit = parse_positive(&lookup, "ACCELERATE_RATE_LIMIT", 20)?;
        let request_timeout_secs = parse_positive(&lookup, "REQUEST_TIMEOUT_SECS", 15)?;
        let retention_secs = parse_positive(&lookup, "FINISHED_RACE_RETENTION_SECS", 600)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),

            data_file: lookup("DATA_FILE")
                .unwrap_or_else(|| "data.json".to_string())
                .into(),
            client_origin: lookup("CLIENT_ORIGIN")
                .unwrap_or_else(|| "http://lvh.me:3000".to_string()),

            tick_period: Duration::from_millis(tick_millis as u64),
            accelerate_rate_limit,
            request_timeout: Duration::from_secs(request_timeout_secs as u64),
            finished_race_retention: Duration::from_secs(retention_secs as u64),
        })
    }
}

fn parse_positive<F>(lookup: &F, key: &'static str, default: u32) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(value) if value > 0 => Ok(value),
            _ => Err(ConfigError::InvalidNumber(key)),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Environment variable {0} must be a positive integer")]
    InvalidNumber(&'static str),
}
