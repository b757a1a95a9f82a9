//! Bearer authentication middleware.
//!
//! Clients must present `Authorization: Bearer <token>` matching the
//! configured bearer exactly. The presented value is never logged.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::{error::AppError, AppState};

/// Extract the token from a `Bearer <token>` header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Reject requests whose bearer token does not match the configured one.
pub async fn bearer_auth(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = extract_bearer_token(auth_header).ok_or(AppError::Unauthorized)?;

    let expected = {
        let config = state.config.read().expect("config lock poisoned");
        config.bearer_token.clone()
    };

    if token.is_empty() || !constant_time_eq(token, &expected) {
        warn!("rejected request with invalid bearer token");
        return Err(AppError::InvalidToken);
    }

    Ok(next.run(request).await)
}
