//! Error types for the proxy.
//!
//! Every HTTP-facing failure maps to a status code and a flat
//! `{"error": "<message>"}` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::balancer::pool::PoolError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid authorization header")]
    Unauthorized,

    #[error("invalid token")]
    InvalidToken,

    #[error("{0}")]
    BadRequest(String),

    #[error("no available JWT tokens: {0}")]
    TokenPool(#[from] PoolError),

    #[error("{0}")]
    Upstream(String),

    #[error("upstream request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::TokenPool(_)
            | AppError::Upstream(_)
            | AppError::Http(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
