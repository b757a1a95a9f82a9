//! Request translation into the upstream envelope.

use serde::Serialize;
use thiserror::Error;

use crate::openai::{ChatCompletionRequest, Role};

use super::{registry, NEW_CHAT_PROMPT};

/// Upstream chat request envelope
#[derive(Debug, Clone, Serialize)]
pub struct JetbrainsRequest {
    pub prompt: &'static str,
    pub profile: String,
    pub chat: ChatBlock,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatBlock {
    pub messages: Vec<UpstreamMessage>,
}

/// Upstream message with its type tag
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,
}

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("model '{0}' not found")]
    UnknownModel(String),
}

/// Build the minimal envelope used by health probes.
pub fn probe_request(profile: &str) -> JetbrainsRequest {
    JetbrainsRequest {
        prompt: NEW_CHAT_PROMPT,
        profile: profile.to_string(),
        chat: ChatBlock {
            messages: vec![UpstreamMessage {
                kind: "user_message",
                content: "test".to_string(),
            }],
        },
    }
}

/// Translate an OpenAI chat request into the upstream envelope.
///
/// Messages with roles outside {system, user, assistant} are dropped.
pub fn to_upstream_request(
    request: &ChatCompletionRequest,
) -> Result<JetbrainsRequest, TranslateError> {
    let profile = registry::resolve_profile(&request.model)
        .ok_or_else(|| TranslateError::UnknownModel(request.model.clone()))?;

    let messages = request
        .messages
        .iter()
        .filter_map(|message| {
            let kind = match message.role {
                Role::System => "system_message",
                Role::User => "user_message",
                Role::Assistant => "assistant_message",
                Role::Other => return None,
            };
            Some(UpstreamMessage {
                kind,
                content: message.content.clone(),
            })
        })
        .collect();

    Ok(JetbrainsRequest {
        prompt: NEW_CHAT_PROMPT,
        profile: profile.to_string(),
        chat: ChatBlock { messages },
    })
}
