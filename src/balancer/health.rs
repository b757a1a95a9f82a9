//! Background JWT health prober.
//!
//! Periodically exercises every credential against the upstream chat
//! endpoint and feeds the outcome back into the pool. A probe is a liveness
//! check only: the response body is never read or forwarded.
//!
//! Classification note for operators: 403 means the quota is exhausted but
//! the credential itself is valid, so the prober keeps it healthy; the
//! request path treats a live 403 as a per-request upstream failure.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::balancer::pool::{token_preview, TokenPool};
use crate::config::Config;
use crate::jetbrains::{translate, CHAT_STREAM_PATH, JWT_HEADER};

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_MAX_ATTEMPTS: u32 = 3;
const PROBE_RETRY_DELAY: Duration = Duration::from_secs(1);
const PROBE_PROFILE: &str = "openai-gpt-4o";

struct Worker {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Background health prober over a borrowed pool reference.
pub struct HealthProber {
    pool: Arc<TokenPool>,
    client: reqwest::Client,
    endpoint: String,
    interval: RwLock<Duration>,
    worker: Mutex<Option<Worker>>,
}

impl HealthProber {
    pub fn new(config: &Config, pool: Arc<TokenPool>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .danger_accept_invalid_certs(config.upstream_insecure_tls)
            .build()?;

        Ok(Self {
            pool,
            client,
            endpoint: format!(
                "{}{}",
                config.upstream_base_url.trim_end_matches('/'),
                CHAT_STREAM_PATH
            ),
            interval: RwLock::new(config.health_check_interval),
            worker: Mutex::new(None),
        })
    }

    /// Update the sweep interval. Takes effect on the next tick.
    pub fn set_interval(&self, interval: Duration) {
        *self.interval.write().expect("prober interval lock poisoned") = interval;
    }

    /// Start the background sweep loop. A second call while running is a no-op.
    pub async fn start(self: &Arc<Self>) {
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let prober = Arc::clone(self);
        let handle = tokio::spawn(async move { prober.run(stop_rx).await });

        *worker = Some(Worker {
            stop: stop_tx,
            handle,
        });
        info!("JWT health prober started");
    }

    /// Signal the sweep loop to quit and wait for it to finish.
    pub async fn stop(&self) {
        let worker = self.worker.lock().await.take();
        let Some(worker) = worker else {
            return;
        };

        let _ = worker.stop.send(true);
        let _ = worker.handle.await;
        info!("JWT health prober stopped");
    }

    async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        loop {
            self.sweep().await;

            let interval = *self.interval.read().expect("prober interval lock poisoned");
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Probe every credential concurrently, then log the pool summary.
    async fn sweep(&self) {
        debug!("running JWT health sweep");

        let keys = self.pool.token_keys();
        join_all(keys.into_iter().map(|token| self.probe_token(token))).await;

        info!(
            healthy = self.pool.healthy_count(),
            total = self.pool.total_count(),
            "health sweep complete"
        );
    }

    async fn probe_token(&self, token: String) {
        for attempt in 1..=PROBE_MAX_ATTEMPTS {
            if self.probe_once(&token).await {
                self.pool.mark_healthy(&token);
                return;
            }
            if attempt < PROBE_MAX_ATTEMPTS {
                tokio::time::sleep(PROBE_RETRY_DELAY).await;
            }
        }

        self.pool.mark_unhealthy(&token);
        warn!(token = %token_preview(&token), "JWT health probe failed");
    }

    /// One probe attempt. The response body is dropped unread.
    async fn probe_once(&self, token: &str) -> bool {
        let body = translate::probe_request(PROBE_PROFILE);

        let response = match self
            .client
            .post(&self.endpoint)
            .header(JWT_HEADER, token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                debug!(
                    token = %token_preview(token),
                    error = %err,
                    "health probe request error"
                );
                return false;
            }
        };

        match response.status().as_u16() {
            200 => true,
            // Quota exhausted, but the credential itself is valid.
            403 => true,
            status => {
                debug!(
                    token = %token_preview(token),
                    status,
                    "health probe rejected"
                );
                false
            }
        }
    }
}
