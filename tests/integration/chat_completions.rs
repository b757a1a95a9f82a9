//! Chat completions endpoint tests: bearer auth, validation, buffered and
//! streaming translation, and pool outcome feedback.

use axum::http::StatusCode;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{
    hello_events, mount_chat_stream, test_server, test_state, CHAT_STREAM_PATH, TEST_JWT,
};

fn chat_payload(model: &str, stream: bool) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": "hi"}],
        "stream": stream,
    })
}

#[tokio::test]
async fn rejects_missing_authorization_header() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_wrong_bearer_token() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer("wrong")
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rejects_malformed_json_body() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Invalid request payload");
}

#[tokio::test]
async fn rejects_unknown_model_without_contacting_upstream() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("does-not-exist", false))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Model 'does-not-exist' not supported");

    let requests = upstream.received_requests().await.unwrap();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn rejects_empty_message_list() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&json!({"model": "gpt-4o", "messages": []}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "No messages found");
}

#[tokio::test]
async fn buffered_response_assembles_content_and_usage() {
    let upstream = MockServer::start().await;
    mount_chat_stream(&upstream, 200, hello_events()).await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["object"], "chat.completions");
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 5);
}

#[tokio::test]
async fn translated_envelope_reaches_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_STREAM_PATH))
        .and(body_partial_json(json!({
            "prompt": "ij.chat.request.new-chat",
            "profile": "openai-gpt-4o",
            "chat": {"messages": [{"type": "user_message", "content": "hi"}]},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_raw(hello_events(), "text/event-stream"))
        .expect(1)
        .mount(&upstream)
        .await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::OK);
}

#[tokio::test]
async fn streaming_response_forwards_chunks_and_terminator() {
    let upstream = MockServer::start().await;
    mount_chat_stream(&upstream, 200, hello_events()).await;
    let server = test_server(test_state(&upstream));

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("gpt-4o", true))
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "text/event-stream"
    );

    let text = response.text();
    let payloads: Vec<&str> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .collect();
    assert!(payloads.len() >= 3);

    let done_count = payloads.iter().filter(|p| **p == "[DONE]").count();
    assert_eq!(done_count, 1);
    assert_eq!(*payloads.last().unwrap(), "[DONE]");

    let chunks: Vec<Value> = payloads
        .iter()
        .filter(|p| **p != "[DONE]")
        .map(|p| serde_json::from_str(p).unwrap())
        .collect();
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0]["object"], "chat.completion.chunk");
    assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "Hel");
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "lo");
    assert_eq!(chunks[2]["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunks[2]["usage"]["total_tokens"], 5);
}

#[tokio::test]
async fn upstream_401_marks_credential_unhealthy() {
    let upstream = MockServer::start().await;
    mount_chat_stream(&upstream, 401, String::new()).await;
    let state = test_state(&upstream);
    let server = test_server(state.clone());

    assert_eq!(state.pool.healthy_count(), 1);

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "JWT token invalid");
    assert_eq!(state.pool.healthy_count(), 0);
}

#[tokio::test]
async fn upstream_403_surfaces_error_without_pool_feedback() {
    let upstream = MockServer::start().await;
    mount_chat_stream(&upstream, 403, "quota exhausted".to_string()).await;
    let state = test_state(&upstream);
    let server = test_server(state.clone());

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Jetbrains API error: status 403"));
    // Quota exhaustion does not demote the credential.
    assert_eq!(state.pool.healthy_count(), 1);
}

#[tokio::test]
async fn pool_starvation_returns_500() {
    let upstream = MockServer::start().await;
    let state = test_state(&upstream);
    state.pool.mark_unhealthy(TEST_JWT);
    let server = test_server(state);

    let response = server
        .post("/v1/chat/completions")
        .authorization_bearer(crate::common::TEST_BEARER)
        .json(&chat_payload("gpt-4o", false))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("no available JWT tokens"));
}
