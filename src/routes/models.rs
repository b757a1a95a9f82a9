//! Models endpoint
//!
//! Lists the models available through the proxy.

use axum::Json;

use crate::jetbrains::registry::{self, ModelList};

/// List available models
pub async fn list_models() -> Json<ModelList> {
    Json(registry::supported_models())
}
