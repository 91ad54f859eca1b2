use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid request format")]
    InvalidFormat,

    #[error("invalid language: {0}")]
    InvalidLanguage(String),

    #[error("unauthorized access")]
    Unauthorized,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("identifier already exists: {0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::InvalidInput(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_input",
                reason.clone(),
            ),
            AppError::InvalidFormat => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_format",
                "request body matches neither accepted shape".to_string(),
            ),
            AppError::InvalidLanguage(lang) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_language",
                format!("primary language is invalid: {}", lang),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "unauthorized",
                "invalid or missing credential".to_string(),
            ),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "invalid_request_error",
                "not_found",
                format!("{} not found", what),
            ),
            AppError::Conflict(id) => (
                StatusCode::CONFLICT,
                "invalid_request_error",
                "conflict",
                format!("identifier '{}' already exists", id),
            ),
            AppError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_error",
                "rate_limit_exceeded",
                "rate limit exceeded".to_string(),
            ),
            AppError::Synthesis(reason) => {
                tracing::error!("Synthesis error: {}", reason);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "synthesis_error",
                    "synthesis_failed",
                    "text-to-speech conversion failed".to_string(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        let mut response = (status, body).into_response();

        // Add Retry-After header for rate limit errors
        if matches!(self, AppError::RateLimited) {
            response
                .headers_mut()
                .insert("retry-after", axum::http::HeaderValue::from_static("60"));
        }

        response
    }
}
