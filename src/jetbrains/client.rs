//! Upstream HTTP client.
//!
//! Opens the chat stream with a pooled JWT credential and feeds the request
//! outcome back into the pool. The response body is never parsed here; SSE
//! framing belongs to the translator.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::balancer::pool::{token_preview, TokenPool};
use crate::config::Config;
use crate::error::{AppError, AppResult};

use super::translate::JetbrainsRequest;
use super::{CHAT_STREAM_PATH, JWT_HEADER};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the JetBrains AI chat streaming endpoint
pub struct JetbrainsClient {
    client: reqwest::Client,
    endpoint: String,
    pool: Arc<TokenPool>,
}

impl JetbrainsClient {
    pub fn new(config: &Config, pool: Arc<TokenPool>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(config.upstream_insecure_tls)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}{}",
                config.upstream_base_url.trim_end_matches('/'),
                CHAT_STREAM_PATH
            ),
            pool,
        })
    }

    /// Acquire a credential, open the upstream stream, and report the
    /// outcome to the pool.
    ///
    /// Transport errors and 401 mark the credential unhealthy; 200 marks it
    /// healthy; any other status is surfaced without touching pool state.
    pub async fn open_chat_stream(&self, request: &JetbrainsRequest) -> AppResult<reqwest::Response> {
        let token = self.pool.acquire()?;

        let response = match self
            .client
            .post(&self.endpoint)
            .header(JWT_HEADER, &token)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "jetbrains ai request error");
                self.pool.mark_unhealthy(&token);
                return Err(AppError::Http(err));
            }
        };

        match response.status().as_u16() {
            200 => {
                self.pool.mark_healthy(&token);
                Ok(response)
            }
            401 => {
                self.pool.mark_unhealthy(&token);
                warn!(token = %token_preview(&token), "upstream rejected JWT token (401)");
                Err(AppError::Upstream("JWT token invalid".to_string()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(AppError::Upstream(format!(
                    "Jetbrains API error: status {status}, body: {body}"
                )))
            }
        }
    }
}
