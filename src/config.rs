//! Process configuration from environment variables
//!
//! A `.env` file in the working directory is loaded first, so local
//! development can keep the API key out of the shell environment.

use crate::llm::LlmConfig;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read secret file {}: {source}", path.display())]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub generation_timeout: Duration,
    /// Sessions untouched for this long are evicted
    pub session_idle: Duration,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenv::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("ITINERARY_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    name: "ITINERARY_PORT",
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        let generation_timeout = positive_secs(
            &lookup,
            "ITINERARY_GENERATION_TIMEOUT_SECS",
            DEFAULT_GENERATION_TIMEOUT,
        )?;
        let session_idle =
            positive_secs(&lookup, "ITINERARY_SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE)?;

        Ok(Self {
            port,
            generation_timeout,
            session_idle,
            llm: LlmConfig::from_lookup(&lookup)?,
        })
    }
}

fn positive_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match lookup(name) {
        Some(value) => match value.trim().parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(ConfigError::InvalidValue { name, value }),
        },
        None => Ok(default),
    }
}
