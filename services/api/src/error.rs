//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use homework_core::domain::ParseEnumError;
use homework_core::forms::ValidationError;
use homework_core::ports::PortError;
use homework_core::service::ServiceError;
use homework_core::theme::ThemeError;
use serde_json::json;
use tracing::error;

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("{0}")]
    Port(#[from] PortError),

    /// A form or payload failed local validation.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A two-step operation stopped halfway.
    #[error("{0}")]
    Partial(String),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    BadRequest(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Port(e) => ApiError::Port(e),
            ServiceError::Validation(e) => ApiError::Validation(e),
            ServiceError::Partial(msg) => ApiError::Partial(msg),
        }
    }
}

impl From<ThemeError> for ApiError {
    fn from(e: ThemeError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ParseEnumError> for ApiError {
    fn from(e: ParseEnumError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Port(PortError::Unauthorized) => StatusCode::UNAUTHORIZED,
            ApiError::Port(PortError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Port(PortError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Port(PortError::Remote(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        }
        // Internals are logged, not echoed.
        let message = match &self {
            ApiError::Database(_) | ApiError::Migrate(_) | ApiError::Io(_) | ApiError::Config(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let mut body = json!({ "error": message });
        if let ApiError::Validation(v) = &self {
            body["field"] = json!(v.field);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
