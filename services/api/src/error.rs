//! services/api/src/error.rs
//!
//! Startup and wiring failures of the feed service. Per-request problems never
//! reach this type; they are reported to the client over the socket instead.

use crate::config::ConfigError;
use sqlx::migrate::MigrateError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting the Postgres pool failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] MigrateError),

    /// Binding the listener or serving failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}
