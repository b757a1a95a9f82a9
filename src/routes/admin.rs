//! Admin endpoints: health, config summary, stats, and reload.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::info;

use crate::{
    config::{format_duration, Config},
    error::{AppError, AppResult},
    AppState,
};

/// Pool health summary
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.config.read().expect("config lock poisoned");

    Json(json!({
        "status": "ok",
        "healthy_tokens": state.pool.healthy_count(),
        "total_tokens": state.pool.total_count(),
        "strategy": state.pool.strategy().to_string(),
        "server_info": {
            "host": config.server_host,
            "port": config.server_port,
        },
    }))
}

/// Configuration summary with credential previews only
pub async fn config_summary(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.config.read().expect("config lock poisoned");
    Json(config.summary())
}

/// Pool and configuration statistics
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = state.config.read().expect("config lock poisoned");

    Json(json!({
        "balancer": {
            "healthy_tokens": state.pool.healthy_count(),
            "total_tokens": state.pool.total_count(),
            "strategy": state.pool.strategy().to_string(),
        },
        "config": {
            "health_check_interval": format_duration(config.health_check_interval),
            "server_host": config.server_host,
            "server_port": config.server_port,
        },
    }))
}

/// Re-run the configuration load and refresh the credential pool.
///
/// The prober itself keeps running; only its interval is updated.
pub async fn reload(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let config = Config::load(&state.overrides).map_err(AppError::Internal)?;

    state.pool.refresh(&config.jetbrains_tokens);
    state.prober.set_interval(config.health_check_interval);

    {
        let mut current = state.config.write().expect("config lock poisoned");
        *current = config;
    }

    info!("configuration reloaded");
    Ok(Json(json!({
        "message": "Configuration reloaded successfully",
    })))
}
