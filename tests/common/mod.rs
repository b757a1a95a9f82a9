//! Shared test fixtures: app state wired against a wiremock upstream,
//! plus SSE body builders.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jetbrains_ai_proxy::config::{parse_token_list, CliOverrides, Config};
use jetbrains_ai_proxy::{routes, AppState};

/// Bearer token clients must present
pub const TEST_BEARER: &str = "secret";
/// The pooled upstream JWT credential
pub const TEST_JWT: &str = "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9.test-jwt";
/// Upstream chat stream path
pub const CHAT_STREAM_PATH: &str = "/user/v5/llm/chat/stream/v7";

/// Config pointing at the mock upstream
pub fn test_config(upstream_url: &str) -> Config {
    Config {
        jetbrains_tokens: parse_token_list(TEST_JWT),
        bearer_token: TEST_BEARER.to_string(),
        upstream_base_url: upstream_url.to_string(),
        ..Config::default()
    }
}

pub fn test_state(upstream: &MockServer) -> Arc<AppState> {
    AppState::new(test_config(&upstream.uri()), CliOverrides::default())
        .expect("test state should build")
}

pub fn test_server(state: Arc<AppState>) -> TestServer {
    TestServer::new(routes::create_router(state)).expect("test server should start")
}

/// Join event payloads into SSE framing
pub fn sse_body(events: &[&str]) -> String {
    events
        .iter()
        .map(|event| format!("data: {event}\n\n"))
        .collect()
}

/// The canonical two-content-events-then-quota upstream stream
pub fn hello_events() -> String {
    sse_body(&[
        r#"{"type":"Content","event_type":"content","content":"Hel"}"#,
        r#"{"type":"Content","event_type":"content","content":"lo"}"#,
        r#"{"type":"QuotaMetadata","event_type":"quota","spent":{"amount":"5"}}"#,
        "end",
    ])
}

/// Mount the upstream chat stream endpoint, requiring the pooled JWT header
pub async fn mount_chat_stream(server: &MockServer, status: u16, body: String) {
    Mock::given(method("POST"))
        .and(path(CHAT_STREAM_PATH))
        .and(header("grazie-authenticate-jwt", TEST_JWT))
        .respond_with(ResponseTemplate::new(status).set_body_raw(body, "text/event-stream"))
        .mount(server)
        .await;
}
