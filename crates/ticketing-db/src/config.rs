//! Environment configuration.
//!
//! Configuration is loaded from environment variables with fallback to defaults.
//!
//! | Variable                       | Default          |
//! |--------------------------------|------------------|
//! | `TICKETING_DB_PATH`            | `./ticketing.db` |
//! | `TICKETING_DB_MAX_CONNECTIONS` | `5`              |
//! | `TICKETING_LOCK_TIMEOUT_MS`    | `5000`           |
//! | `TICKETING_SEQUENCE_RETRIES`   | `3`              |

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::pool::DbConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite database file.
    pub database_path: PathBuf,

    /// Pool size.
    pub max_connections: u32,

    /// How long a writer waits for the ticket write lock.
    pub lock_timeout: Duration,

    /// Attempts per ticket creation before reporting a sequencing conflict.
    pub sequence_retries: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = AppConfig {
            database_path: lookup("TICKETING_DB_PATH")
                .unwrap_or_else(|| "./ticketing.db".to_string())
                .into(),

            max_connections: parse_or(&lookup, "TICKETING_DB_MAX_CONNECTIONS", 5)?,

            lock_timeout: Duration::from_millis(parse_or(
                &lookup,
                "TICKETING_LOCK_TIMEOUT_MS",
                5_000,
            )?),

            sequence_retries: parse_or(&lookup, "TICKETING_SEQUENCE_RETRIES", 3)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "TICKETING_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        if config.sequence_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "TICKETING_SEQUENCE_RETRIES".to_string(),
            ));
        }

        Ok(config)
    }

    /// Builds the database configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.max_connections)
            .busy_timeout(self.lock_timeout)
            .sequence_retries(self.sequence_retries)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
