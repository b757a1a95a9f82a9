//! HTTP routes.
//!
//! The OpenAI-compatible API lives under `/v1` behind the bearer guard;
//! admin endpoints are open.

pub mod admin;
pub mod chat;
pub mod models;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{middleware::auth, AppState};

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/v1/models", get(models::list_models))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::bearer_auth,
        ));

    Router::new()
        // Admin & monitoring endpoints
        .route("/health", get(admin::health))
        .route("/config", get(admin::config_summary))
        .route("/stats", get(admin::stats))
        .route("/reload", post(admin::reload))
        .merge(api)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
