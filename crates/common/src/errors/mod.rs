//! Error types for ContentForge services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for different failure modes
//! - A tagged error type for generation service calls
//! - HTTP status code mapping
//! - Structured error responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    InvalidInput,

    // Automation control errors (2xxx)
    MissingCredential,
    AutomationDisabled,

    // Resource errors (4xxx)
    BatchNotFound,
    CategoryNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Persistence errors (7xxx)
    PersistenceError,

    // External service errors (8xxx)
    GenerationError,
    StoreError,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidInput => 1001,

            ErrorCode::MissingCredential => 2001,
            ErrorCode::AutomationDisabled => 2002,

            ErrorCode::BatchNotFound => 4001,
            ErrorCode::CategoryNotFound => 4002,

            ErrorCode::RateLimited => 6001,

            ErrorCode::PersistenceError => 7001,

            ErrorCode::GenerationError => 8001,
            ErrorCode::StoreError => 8002,
            ErrorCode::UpstreamError => 8003,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Classified failure of a single generation request.
///
/// The scheduler decides between skipping a keyword and halting the run
/// based on [`GenerationError::is_credential_failure`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Invalid API key, check the generation service credentials")]
    InvalidCredential,

    #[error("Generation service rate limit exceeded")]
    RateLimited,

    #[error("Access denied, check the API key permissions")]
    Forbidden,

    #[error("Generation service returned no content")]
    NoContent,

    #[error("Model \"{model}\" is not available")]
    ModelUnavailable { model: String },

    #[error("Generation request timed out")]
    Timeout,

    #[error("Generation failed ({status:?}): {message}")]
    Unknown { status: Option<u16>, message: String },
}

impl GenerationError {
    /// Failures that will repeat for every keyword until an operator acts
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, GenerationError::InvalidCredential)
    }

    /// Short label used for metrics and batch diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidCredential => "invalid_credential",
            GenerationError::RateLimited => "rate_limited",
            GenerationError::Forbidden => "forbidden",
            GenerationError::NoContent => "no_content",
            GenerationError::ModelUnavailable { .. } => "model_unavailable",
            GenerationError::Timeout => "timeout",
            GenerationError::Unknown { .. } => "unknown",
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    // Automation control errors
    #[error("Generation service API key is not configured")]
    MissingCredential,

    #[error("Content automation is disabled")]
    AutomationDisabled,

    // Resource errors
    #[error("Keyword batch not found: {id}")]
    BatchNotFound { id: String },

    #[error("Category not found: {id}")]
    CategoryNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Persistence errors
    #[error("Batch persistence error: {message}")]
    Persistence { message: String },

    // External service errors
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Article store error: {message}")]
    Store { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Shorthand for an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::InvalidInput { .. } => ErrorCode::InvalidInput,
            AppError::MissingCredential => ErrorCode::MissingCredential,
            AppError::AutomationDisabled => ErrorCode::AutomationDisabled,
            AppError::BatchNotFound { .. } => ErrorCode::BatchNotFound,
            AppError::CategoryNotFound { .. } => ErrorCode::CategoryNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Persistence { .. } => ErrorCode::PersistenceError,
            AppError::Generation(_) => ErrorCode::GenerationError,
            AppError::Store { .. } => ErrorCode::StoreError,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::BatchNotFound { .. } |
            AppError::CategoryNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::MissingCredential |
            AppError::AutomationDisabled => StatusCode::CONFLICT,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Persistence { .. } |
            AppError::Internal { .. } |
            AppError::Configuration { .. } |
            AppError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Generation(_) |
            AppError::Store { .. } |
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
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
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Persistence {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
