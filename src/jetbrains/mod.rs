//! JetBrains AI upstream protocol: model registry, request translation,
//! HTTP client, and SSE response translation.

pub mod client;
pub mod registry;
pub mod sse;
pub mod translate;

pub use client::JetbrainsClient;

/// Path of the chat streaming endpoint, relative to the upstream base URL
pub const CHAT_STREAM_PATH: &str = "/user/v5/llm/chat/stream/v7";

/// Fixed prompt tag the upstream expects for new chat requests
pub const NEW_CHAT_PROMPT: &str = "ij.chat.request.new-chat";

/// Header carrying the upstream JWT credential
pub const JWT_HEADER: &str = "grazie-authenticate-jwt";
