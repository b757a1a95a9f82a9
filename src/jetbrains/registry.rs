//! Static model registry.
//!
//! Maps client-visible model identifiers to upstream profile identifiers
//! plus provider metadata.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

struct ModelSpec {
    owned_by: &'static str,
    profile: &'static str,
}

static MODELS: Lazy<BTreeMap<&'static str, ModelSpec>> = Lazy::new(|| {
    BTreeMap::from([
        ("gpt-4o", ModelSpec { owned_by: "openai", profile: "openai-gpt-4o" }),
        ("o1", ModelSpec { owned_by: "openai", profile: "openai-o1" }),
        ("o3", ModelSpec { owned_by: "openai", profile: "openai-o3" }),
        ("o3-mini", ModelSpec { owned_by: "openai", profile: "openai-o3-mini" }),
        ("o4-mini", ModelSpec { owned_by: "openai", profile: "openai-o4-mini" }),
        ("gpt4.1", ModelSpec { owned_by: "openai", profile: "openai-gpt4.1" }),
        ("gpt4.1-mini", ModelSpec { owned_by: "openai", profile: "openai-gpt4.1-mini" }),
        ("gpt4.1-nano", ModelSpec { owned_by: "openai", profile: "openai-gpt4.1-nano" }),
        ("gemini-pro-2.5", ModelSpec { owned_by: "google", profile: "google-chat-gemini-pro-2.5" }),
        ("gemini-flash-2.0", ModelSpec { owned_by: "google", profile: "google-chat-gemini-flash-2.0" }),
        ("gemini-flash-2.5", ModelSpec { owned_by: "google", profile: "google-chat-gemini-flash-2.5" }),
        ("claude-3.5-haiku", ModelSpec { owned_by: "anthropic", profile: "anthropic-claude-3.5-haiku" }),
        ("claude-3.5-sonnet", ModelSpec { owned_by: "anthropic", profile: "anthropic-claude-3.5-sonnet" }),
        ("claude-3.7-sonnet", ModelSpec { owned_by: "anthropic", profile: "anthropic-claude-3.7-sonnet" }),
        ("claude-4-sonnet", ModelSpec { owned_by: "anthropic", profile: "anthropic-claude-4-sonnet" }),
    ])
});

/// Model entry in the OpenAI listing shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub owned_by: String,
    pub profile: String,
}

/// Model listing in the OpenAI shape
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

/// Whether a client-visible model identifier is known
pub fn contains(model: &str) -> bool {
    MODELS.contains_key(model)
}

/// Resolve the upstream profile for a client-visible model identifier
pub fn resolve_profile(model: &str) -> Option<&'static str> {
    MODELS.get(model).map(|spec| spec.profile)
}

/// The full model listing, in stable (sorted) order
pub fn supported_models() -> ModelList {
    let data = MODELS
        .iter()
        .map(|(id, spec)| ModelInfo {
            id: (*id).to_string(),
            object: "model".to_string(),
            owned_by: spec.owned_by.to_string(),
            profile: spec.profile.to_string(),
        })
        .collect();

    ModelList {
        object: "list".to_string(),
        data,
    }
}
