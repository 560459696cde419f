//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    /// Directory attachment objects are written to.
    pub storage_root: PathBuf,
    /// Base URL attachment objects are served from.
    pub public_base_url: String,
    pub cors_origin: String,
    pub session_days: i64,
    pub max_upload_bytes: usize,
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

        // --- Server and Database ---
        let bind_address: SocketAddr = parse_var("BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Attachments ---
        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./storage"));
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://{}/files", bind_address));
        let max_upload_bytes: usize = parse_var("MAX_UPLOAD_BYTES", "10485760")?;

        // --- Sessions and CORS ---
        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let session_days: i64 = parse_var("SESSION_DAYS", "30")?;
        if session_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_DAYS".to_string(),
                "must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            storage_root,
            public_base_url,
            cors_origin,
            session_days,
            max_upload_bytes,
        })
    }

    /// Settings for tests and tooling that never touch the environment.
    pub fn for_tests() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: String::new(),
            log_level: Level::DEBUG,
            storage_root: std::env::temp_dir().join("homework-storage"),
            public_base_url: "http://127.0.0.1:3000/files".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            session_days: 30,
            max_upload_bytes: 1024 * 1024,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let days: i64 = parse_var("HOMEWORK_TEST_UNSET_VAR", "30").unwrap();
        assert_eq!(days, 30);
    }

    #[test]
    fn parse_var_reports_the_variable_name() {
        let err = parse_var::<usize>("HOMEWORK_TEST_UNSET_VAR", "lots").unwrap_err();
        assert!(err.to_string().contains("HOMEWORK_TEST_UNSET_VAR"));
    }
}
