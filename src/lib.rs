//! JetBrains AI Proxy
//!
//! An OpenAI-compatible reverse proxy in front of the JetBrains AI chat
//! streaming endpoint. Clients authenticate with a static bearer token;
//! upstream requests rotate over a health-checked pool of JWT credentials.

pub mod balancer;
pub mod cli;
pub mod config;
pub mod error;
pub mod jetbrains;
pub mod middleware;
pub mod openai;
pub mod routes;
pub mod tokens;

use std::sync::{Arc, RwLock};

use anyhow::Result;

use crate::balancer::{HealthProber, TokenPool};
use crate::config::{CliOverrides, Config};
use crate::jetbrains::JetbrainsClient;

/// Application state shared across all request handlers.
///
/// The config sits behind a lock so `/reload` can swap it; the pool, the
/// upstream client, and the prober are built once at startup.
pub struct AppState {
    pub config: RwLock<Config>,
    pub overrides: CliOverrides,
    pub pool: Arc<TokenPool>,
    pub jetbrains: JetbrainsClient,
    pub prober: Arc<HealthProber>,
}

impl AppState {
    pub fn new(config: Config, overrides: CliOverrides) -> Result<Arc<Self>> {
        let pool = Arc::new(TokenPool::new(
            &config.jetbrains_tokens,
            config.load_balance_strategy,
        ));
        let jetbrains = JetbrainsClient::new(&config, Arc::clone(&pool))?;
        let prober = Arc::new(HealthProber::new(&config, Arc::clone(&pool))?);

        Ok(Arc::new(Self {
            config: RwLock::new(config),
            overrides,
            pool,
            jetbrains,
            prober,
        }))
    }
}
