use crate::{auth::state::StateError, cache::CacheError, database::DatabaseError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Application error type shared across all route handlers and services.
///
/// Library modules raise their own typed errors (`StateError`, `CacheError`,
/// `DatabaseError`); those are converted here at the route boundary so that
/// every handler can return `Result<_, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid state token: {0}")]
    State(#[from] StateError),
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("Token fetch failed: {0}")]
    TokenFetch(String),
    #[error("Token endpoint timed out: {0}")]
    TokenTimeout(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error"),
            AppError::MissingCredentials(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Configuration error")
            }
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Authentication failed"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "Access denied"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
            AppError::State(_) => (StatusCode::BAD_REQUEST, "Invalid state token"),
            AppError::TokenExchange(_) => (StatusCode::BAD_GATEWAY, "Token exchange failed"),
            AppError::TokenFetch(_) => (StatusCode::BAD_GATEWAY, "Token fetch failed"),
            AppError::TokenTimeout(_) => (StatusCode::GATEWAY_TIMEOUT, "Token endpoint timed out"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            AppError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "Upstream service error"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        let body = Json(json!({
            "error": error_message,
            "message": self.to_string()
        }));

        (status, body).into_response()
    }
}
