//! Error types for VeriNews services
//!
//! Provides a single error enum with:
//! - HTTP status code mapping
//! - Machine-readable error codes
//! - Structured error responses that never leak internal details

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Message returned for every authentication failure.
pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed.";

/// Message returned in place of any 5xx error detail.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    InvalidFormat,
    Unauthorized,
    Forbidden,
    NewsNotFound,
    ReportNotFound,
    NotFound,
    RateLimited,
    UpstreamError,
    DatabaseError,
    CacheError,
    InternalError,
    ConfigurationError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {}", messages.join("; "))]
    Validation { messages: Vec<String> },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Authentication errors. The reason is kept for logs only.
    #[error("Authentication failed: {reason}")]
    Unauthenticated { reason: String },

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("News article not found: {id}")]
    NewsNotFound { id: String },

    #[error("Report not found: {id}")]
    ReportNotFound { id: String },

    #[error("Resource not found: {message}")]
    NotFound { message: String },

    // Rate limiting
    #[error("Rate limit exceeded")]
    RateLimited,

    // External service errors
    #[error("Classification service error: {message}")]
    Upstream {
        status: Option<u16>,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a single-message validation error
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            messages: vec![message.into()],
        }
    }

    /// Shorthand for a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        AppError::Forbidden {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::Unauthenticated { .. } => ErrorCode::Unauthorized,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NewsNotFound { .. } => ErrorCode::NewsNotFound,
            AppError::ReportNotFound { .. } => ErrorCode::ReportNotFound,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited => ErrorCode::RateLimited,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::CacheError { .. } => ErrorCode::CacheError,
            AppError::Database(_) | AppError::DatabaseConnection { .. } => ErrorCode::DatabaseError,
            AppError::Internal { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::InvalidFormat { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NewsNotFound { .. }
            | AppError::ReportNotFound { .. }
            | AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            // Upstream status when the classifier answered, 503 when it didn't
            AppError::Upstream { status, .. } => status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::SERVICE_UNAVAILABLE),

            // 500 Internal Server Error
            AppError::CacheError { .. }
            | AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation { .. } => "Validation failed.".to_string(),
            AppError::Unauthenticated { .. } => AUTH_FAILED_MESSAGE.to_string(),
            AppError::Upstream { .. } => "Error from classification API.".to_string(),
            _ if self.is_server_error() => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    /// Structured details attached to the response body
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { messages } => Some(serde_json::json!(messages)),
            AppError::Upstream { details, .. } => details.clone(),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log based on severity; the full message stays server side
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if matches!(self, AppError::Unauthenticated { .. }) {
            tracing::debug!(error = %self, "Authentication rejected");
        } else {
            tracing::warn!(
                error = %self,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message: self.public_message(),
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => msg.to_string(),
                    None => format!("{} is invalid", field),
                })
            })
            .collect();
        messages.sort();
        AppError::Validation { messages }
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::InvalidFormat {
            message: rejection.body_text(),
        }
    }
}

impl From<axum::extract::rejection::QueryRejection> for AppError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        AppError::InvalidFormat {
            message: rejection.body_text(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::ReportNotFound { id: "test".into() };
        assert_eq!(err.code(), ErrorCode::ReportNotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::Validation {
            messages: vec!["Title cannot be empty".into(), "Content cannot be empty".into()],
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(!err.is_server_error());
        assert!(err.is_client_error());
        assert_eq!(
            err.details(),
            Some(serde_json::json!(["Title cannot be empty", "Content cannot be empty"]))
        );
    }

    #[test]
    fn test_server_error_is_generic() {
        let err = AppError::Internal {
            message: "pool exhausted at db.rs:42".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
        assert_eq!(err.public_message(), INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_unauthenticated_hides_reason() {
        let expired = AppError::Unauthenticated { reason: "token expired".into() };
        let missing = AppError::Unauthenticated { reason: "no token".into() };
        assert_eq!(expired.public_message(), missing.public_message());
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_upstream_status() {
        let relayed = AppError::Upstream {
            status: Some(422),
            message: "bad input".into(),
            details: None,
        };
        assert_eq!(relayed.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let unreachable = AppError::Upstream {
            status: None,
            message: "connection refused".into(),
            details: None,
        };
        assert_eq!(unreachable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
