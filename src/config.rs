//! Runtime configuration read from the environment.

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool, PoolError};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Database connection string.
pub const DATABASE_URL: &str = "DATABASE_URL";
/// Maximum pooled connections.
pub const POOL_SIZE: &str = "REGISTRY_POOL_SIZE";
/// Seconds to wait for a pooled connection.
pub const CONNECTION_TIMEOUT_SECS: &str = "REGISTRY_CONNECTION_TIMEOUT_SECS";
/// Log output format, `text` or `json`.
pub const LOG_FORMAT: &str = "REGISTRY_LOG_FORMAT";

const DEFAULT_POOL_SIZE: u32 = 8;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Log output format for binaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::Invalid {
                key: LOG_FORMAT,
                value: value.to_owned(),
                reason: String::from("expected 'text' or 'json'"),
            }),
        }
    }
}

/// Errors raised while loading configuration or building the pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} must be set")]
    Missing(&'static str),

    /// A variable holds an unusable value.
    #[error("{key}='{value}' is invalid: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The connection pool could not be built.
    #[error("failed to build database pool: {0}")]
    Pool(#[from] PoolError),
}

/// Registry runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Time to wait for a pooled connection.
    pub connection_timeout: Duration,
    /// Log output format.
    pub log_format: LogFormat,
}

impl RegistryConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `DATABASE_URL` is missing or a value does
    /// not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `DATABASE_URL` is missing or a value does
    /// not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let database_url = read(DATABASE_URL).ok_or(ConfigError::Missing(DATABASE_URL))?;
        let pool_size = read(POOL_SIZE)
            .map(|value| parse_positive(POOL_SIZE, &value))
            .transpose()?
            .unwrap_or(DEFAULT_POOL_SIZE);
        let timeout_secs = read(CONNECTION_TIMEOUT_SECS)
            .map(|value| parse_positive(CONNECTION_TIMEOUT_SECS, &value))
            .transpose()?
            .unwrap_or(DEFAULT_CONNECTION_TIMEOUT_SECS);
        let log_format = read(LOG_FORMAT)
            .map(|value| value.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            database_url,
            pool_size,
            connection_timeout: Duration::from_secs(timeout_secs),
            log_format,
        })
    }

    /// Builds a `PostgreSQL` connection pool from this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Pool`] when the pool cannot open its initial
    /// connections.
    pub fn build_pool(&self) -> Result<Pool<ConnectionManager<PgConnection>>, ConfigError> {
        let manager = ConnectionManager::<PgConnection>::new(self.database_url.as_str());
        Ok(Pool::builder()
            .max_size(self.pool_size)
            .connection_timeout(self.connection_timeout)
            .build(manager)?)
    }
}

fn parse_positive<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let parsed = value.parse::<T>().map_err(|err| ConfigError::Invalid {
        key,
        value: value.to_owned(),
        reason: err.to_string(),
    })?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_owned(),
            reason: String::from("must be greater than zero"),
        });
    }
    Ok(parsed)
}
