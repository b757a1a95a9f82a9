//! Health prober tests against a mock upstream.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jetbrains_ai_proxy::balancer::{HealthProber, TokenPool};

use crate::common::{test_config, CHAT_STREAM_PATH, TEST_JWT};

async fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    condition()
}

fn build_pool(upstream: &MockServer) -> (Arc<TokenPool>, Arc<HealthProber>) {
    let config = test_config(&upstream.uri());
    let pool = Arc::new(TokenPool::new(
        &config.jetbrains_tokens,
        config.load_balance_strategy,
    ));
    let prober = Arc::new(HealthProber::new(&config, Arc::clone(&pool)).unwrap());
    (pool, prober)
}

#[tokio::test]
async fn probe_sends_minimal_envelope_and_recovers_token_on_200() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_STREAM_PATH))
        .and(header("grazie-authenticate-jwt", TEST_JWT))
        .and(body_partial_json(json!({
            "prompt": "ij.chat.request.new-chat",
            "profile": "openai-gpt-4o",
            "chat": {"messages": [{"type": "user_message", "content": "test"}]},
        })))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;

    let (pool, prober) = build_pool(&upstream);
    pool.mark_unhealthy(TEST_JWT);

    prober.start().await;
    // Second start while running is a no-op.
    prober.start().await;

    let recovered = {
        let pool = Arc::clone(&pool);
        wait_for(move || pool.healthy_count() == 1, Duration::from_secs(3)).await
    };
    assert!(recovered, "probe should mark the token healthy");

    prober.stop().await;
    // Second stop is a no-op.
    prober.stop().await;
}

#[tokio::test]
async fn probe_treats_quota_exhausted_403_as_healthy() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_STREAM_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&upstream)
        .await;

    let (pool, prober) = build_pool(&upstream);
    pool.mark_unhealthy(TEST_JWT);

    prober.start().await;
    let recovered = {
        let pool = Arc::clone(&pool);
        wait_for(move || pool.healthy_count() == 1, Duration::from_secs(3)).await
    };
    assert!(recovered, "quota-exhausted token should stay healthy");

    prober.stop().await;
}

#[tokio::test]
async fn probe_marks_token_unhealthy_after_exhausting_retries() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_STREAM_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&upstream)
        .await;

    let (pool, prober) = build_pool(&upstream);
    assert_eq!(pool.healthy_count(), 1);

    prober.start().await;
    let demoted = {
        let pool = Arc::clone(&pool);
        wait_for(move || pool.healthy_count() == 0, Duration::from_secs(6)).await
    };
    assert!(demoted, "failing token should be marked unhealthy");

    prober.stop().await;
    upstream.verify().await;
}
