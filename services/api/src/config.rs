//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use book_reels_core::{FeedConfig, GestureSettings};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Without a database the service keeps profiles and accounts in memory.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub allowed_origin: String,
    pub feed: FeedConfig,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Feed Behaviour ---
        let defaults = FeedConfig::default();
        let wheel_cooldown = parse_var::<u64, _>(&lookup, "WHEEL_COOLDOWN_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.gestures.wheel_cooldown);
        let swipe_threshold = parse_var::<f64, _>(&lookup, "SWIPE_THRESHOLD")?
            .unwrap_or(defaults.gestures.swipe_threshold);
        if !swipe_threshold.is_finite() || swipe_threshold < 0.0 {
            return Err(ConfigError::InvalidValue(
                "SWIPE_THRESHOLD".to_string(),
                format!("'{}' must be a non-negative number", swipe_threshold),
            ));
        }
        let reveal_delay = parse_var::<u64, _>(&lookup, "REVEAL_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.reveal_delay);

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            allowed_origin,
            feed: FeedConfig {
                gestures: GestureSettings { wheel_cooldown, swipe_threshold },
                reveal_delay,
            },
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(None),
    }
}
