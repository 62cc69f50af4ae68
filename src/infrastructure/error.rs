use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use sqlx::Error as SqlxError;
use validator::ValidationErrors;

/// Standard result type for the application.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors, mapped to HTTP statuses by `ResponseError`.
///
/// The three `Grading*` variants are the user-facing failure taxonomy for
/// calls to the grading service: the service answered with an error status,
/// the service never answered, or the request could not be built at all.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Access forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload incomplete: {0}")]
    UploadIncomplete(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Grading service rejected the submission: {0}")]
    GradingRejected(String),

    #[error("No response from grading service: {0}")]
    GradingUnreachable(String),

    #[error("Could not build grading request: {0}")]
    GradingRequest(String),

    #[error("Database error: {0}")]
    Database(SqlxError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) | AppError::UploadIncomplete(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::GradingRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::GradingUnreachable(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::GradingRequest(_)
            | AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients. Internal failures are collapsed to
    /// a generic text; everything else carries its own message.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(errors) => {
                let mut messages = Vec::new();
                for field_errors in errors.field_errors().values() {
                    for error in field_errors.iter() {
                        if let Some(msg) = error.message.as_ref() {
                            messages.push(msg.to_string());
                        }
                    }
                }
                if messages.is_empty() {
                    "Invalid input".to_string()
                } else {
                    messages.join("; ")
                }
            }
            AppError::Database(_)
            | AppError::Serialization(_)
            | AppError::Configuration(_)
            | AppError::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Standardized error body.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
    code: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.http_status()).json(ErrorBody {
            error: self.public_message(),
            code: self.http_status().as_u16(),
        })
    }
}

impl From<SqlxError> for AppError {
    fn from(error: SqlxError) -> Self {
        match &error {
            SqlxError::RowNotFound => AppError::NotFound("Resource".to_string()),
            SqlxError::Database(db_error) => {
                // 23505 = unique_violation
                if db_error.code().map(|code| code == "23505").unwrap_or(false) {
                    AppError::Conflict("Resource already exists".to_string())
                } else {
                    AppError::Database(error)
                }
            }
            _ => AppError::Database(error),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", error))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Configuration(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        // Timeout/connect checks come first: a timed-out request is also
        // request-kind as far as reqwest is concerned.
        if error.is_timeout() || error.is_connect() {
            AppError::GradingUnreachable(error.to_string())
        } else if error.is_builder() {
            AppError::GradingRequest(error.to_string())
        } else if let Some(status) = error.status() {
            AppError::GradingRejected(format!("status {}", status))
        } else {
            AppError::GradingUnreachable(error.to_string())
        }
    }
}

pub fn not_found<T: Into<String>>(resource: T) -> AppError {
    AppError::NotFound(resource.into())
}

pub fn unauthorized<T: Into<String>>(message: T) -> AppError {
    AppError::Unauthorized(message.into())
}

pub fn forbidden<T: Into<String>>(message: T) -> AppError {
    AppError::Forbidden(message.into())
}

pub fn conflict<T: Into<String>>(message: T) -> AppError {
    AppError::Conflict(message.into())
}
