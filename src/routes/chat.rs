//! Chat completions endpoint
//!
//! OpenAI-compatible chat completions, proxied to the JetBrains AI chat
//! stream. Handles both streaming and buffered responses.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use tracing::info;

use crate::{
    error::AppError,
    jetbrains::{registry, sse, translate},
    openai::ChatCompletionRequest,
    AppState,
};

/// Handle chat completion requests.
///
/// Validation order: payload shape, model, messages. Only then is a
/// credential acquired and the upstream stream opened.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|_| AppError::BadRequest("Invalid request payload".to_string()))?;

    if !registry::contains(&request.model) {
        return Err(AppError::BadRequest(format!(
            "Model '{}' not supported",
            request.model
        )));
    }

    if request.messages.is_empty() {
        return Err(AppError::BadRequest("No messages found".to_string()));
    }

    let upstream_request = translate::to_upstream_request(&request)
        .map_err(|err| AppError::Internal(anyhow::anyhow!(err)))?;

    info!(
        model = %request.model,
        stream = request.stream,
        messages = request.messages.len(),
        "processing chat completion request"
    );

    let upstream = state.jetbrains.open_chat_stream(&upstream_request).await?;

    if request.stream {
        let body = sse::stream_body(upstream.bytes_stream().boxed(), &request);
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .header(header::CONNECTION, "keep-alive")
            .body(body)
            .map_err(|err| AppError::Internal(anyhow::anyhow!("failed to build response: {err}")))?;

        Ok(response)
    } else {
        let response = sse::collect_response(upstream.bytes_stream().boxed(), &request).await?;
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}
