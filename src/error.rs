//! Error taxonomy shared by the submission pipeline.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::ErrorResponse;

/// Errors raised while resolving, rendering, converting or merging submission documents.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{tool} binary not found (tried: {})", .tried.join("; "))]
    ToolUnavailable { tool: String, tried: Vec<String> },
    #[error("{tool} failed: {detail}")]
    ToolFailed { tool: String, detail: String },
    #[error("template rendering failed: {0}")]
    Template(String),
    #[error("file system error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl PipelineError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn tool_failed(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    /// True when the underlying store rejected a duplicate key.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<zip::result::ZipError> for PipelineError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Template(err.to_string())
    }
}

impl From<actix_web::error::BlockingError> for PipelineError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        Self::Io(std::io::Error::other(err.to_string()))
    }
}

impl ResponseError for PipelineError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::NotFound(message) => ErrorResponse::not_found(message),
            Self::Validation(message) => ErrorResponse::bad_request(message),
            Self::PayloadTooLarge(message) => ErrorResponse::payload_too_large(message),
            other => ErrorResponse::internal_error(&other.to_string()),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}
