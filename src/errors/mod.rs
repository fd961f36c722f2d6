use std::io::Error as IoError;

use actix_web::{
    http::{header::RETRY_AFTER, StatusCode},
    HttpResponse, ResponseError,
};
use serde_json::json;
use thiserror::Error;

pub mod config;
pub mod repository;

pub use config::ConfigError;
pub use repository::RepositoryError;

use crate::db::DatabaseError;

#[derive(Debug, Error)]
pub enum AppError {
    // Request-level errors, surfaced before any redirect is issued
    #[error("Missing parameter: {0}")]
    MissingParameter(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
    #[error("Unauthorized: caller identity is required")]
    Unauthorized,
    #[error("Rate limit exceeded: Too many requests, please try again later")]
    RateLimitExceeded { retry_after_secs: u64 },
    #[error("Not found error: {0}")]
    NotFound(String),
    // Storage failures on paths where the caller is still waiting
    #[error("Storage error: {0}")]
    Storage(String),
    // Infrastructure/system errors
    #[error("Server error: {0}")]
    Server(#[from] IoError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Logger error: {0}")]
    Logger(String),
    #[error("Database error: {0}")]
    Database(String),
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<DatabaseError> for AppError {
    fn from(e: DatabaseError) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::InvalidData(msg) => AppError::Validation(msg),
            RepositoryError::Conflict(msg) => AppError::Storage(msg),
            RepositoryError::Database(e) => AppError::Storage(e.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        // Flatten field errors into a single string
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let reasons = errs
                    .iter()
                    .map(|e| e.message.clone().unwrap_or_else(|| e.code.clone()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}: {}", field, reasons)
            })
            .collect::<Vec<_>>()
            .join("; ");
        AppError::Validation(message)
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingParameter(_)
            | AppError::Validation(_)
            | AppError::InvalidPagination(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Storage(_)
            | AppError::Server(_)
            | AppError::Config(_)
            | AppError::Logger(_)
            | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_string = self.to_string();
        let (error_type, message) = error_string
            .split_once(':')
            .map(|(t, m)| (t.trim(), m.trim()))
            .unwrap_or(("Error", "An error occurred"));

        // Storage details stay in the logs
        let error_message = match self {
            AppError::Storage(_) | AppError::Database(_) => {
                "An internal error occurred"
            }
            _ if message.is_empty() => "An error occurred",
            _ => message,
        };

        let code = self.status_code().as_u16();
        let mut builder = HttpResponse::build(self.status_code());
        if let AppError::RateLimitExceeded { retry_after_secs } = self {
            builder.insert_header((RETRY_AFTER, retry_after_secs.to_string()));
        }

        builder.json(json!({
            "success": false,
            "type": error_type.to_uppercase().replace(' ', "_"),
            "error": error_message,
            "status_code": code,
        }))
    }
}
