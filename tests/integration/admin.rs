//! Admin endpoint tests: health, config summary, stats, reload.

use axum::http::StatusCode;
use serde_json::Value;
use wiremock::MockServer;

use crate::common::{test_server, test_state, TEST_JWT};

#[tokio::test]
async fn health_reports_pool_state() {
    let upstream = MockServer::start().await;
    let state = test_state(&upstream);
    let server = test_server(state.clone());

    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["healthy_tokens"], 1);
    assert_eq!(body["total_tokens"], 1);
    assert_eq!(body["strategy"], "round_robin");
    assert_eq!(body["server_info"]["port"], 8080);

    state.pool.mark_unhealthy(TEST_JWT);
    let body: Value = server.get("/health").await.json();
    assert_eq!(body["healthy_tokens"], 0);
    assert_eq!(body["total_tokens"], 1);
}

#[tokio::test]
async fn config_summary_shows_previews_not_credentials() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server.get("/config").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["jwt_tokens_count"], 1);
    assert_eq!(body["bearer_token_set"], true);

    let preview = body["jwt_tokens"][0]["token_preview"].as_str().unwrap();
    assert!(preview.ends_with("..."));
    assert!(TEST_JWT.starts_with(preview.trim_end_matches("...")));

    let raw = serde_json::to_string(&body).unwrap();
    assert!(!raw.contains(TEST_JWT));
}

#[tokio::test]
async fn stats_reports_balancer_and_config() {
    let upstream = MockServer::start().await;
    let server = test_server(test_state(&upstream));

    let response = server.get("/stats").await;
    response.assert_status(StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["balancer"]["healthy_tokens"], 1);
    assert_eq!(body["balancer"]["total_tokens"], 1);
    assert_eq!(body["balancer"]["strategy"], "round_robin");
    assert_eq!(body["config"]["health_check_interval"], "30s");
    assert_eq!(body["config"]["server_port"], 8080);
}

#[tokio::test]
async fn reload_fails_without_configuration_then_refreshes_pool_from_env() {
    let upstream = MockServer::start().await;
    let state = test_state(&upstream);
    let server = test_server(state.clone());

    // With no file and no env the reload cannot produce a valid config.
    std::env::remove_var("JWT_TOKENS");
    std::env::remove_var("BEARER_TOKEN");
    let response = server.post("/reload").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(state.pool.total_count(), 1);

    // With env configuration the pool is refreshed atomically.
    std::env::set_var("JWT_TOKENS", "reloaded-token-1,reloaded-token-2");
    std::env::set_var("BEARER_TOKEN", "secret");
    let response = server.post("/reload").await;
    response.assert_status(StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["message"], "Configuration reloaded successfully");

    assert_eq!(state.pool.total_count(), 2);
    assert_eq!(state.pool.healthy_count(), 2);
    let keys = state.pool.token_keys();
    assert!(keys.contains(&"reloaded-token-1".to_string()));
    assert!(!keys.contains(&TEST_JWT.to_string()));

    std::env::remove_var("JWT_TOKENS");
    std::env::remove_var("BEARER_TOKEN");
}
