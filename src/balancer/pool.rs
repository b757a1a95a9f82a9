//! JWT credential pool with load-balanced selection.
//!
//! The pool owns every upstream credential together with its health state.
//! Selection only ever considers the currently-healthy subset; health is
//! updated by request outcomes and by the background prober.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::SystemTime;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::TokenEntry;

/// Load balancing strategy over healthy credentials
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    #[default]
    RoundRobin,
    Random,
}

impl LoadBalanceStrategy {
    /// Parse a strategy name. Unknown values fall back to round-robin.
    pub fn parse(value: &str) -> Self {
        match value {
            "random" => LoadBalanceStrategy::Random,
            _ => LoadBalanceStrategy::RoundRobin,
        }
    }
}

impl std::fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadBalanceStrategy::RoundRobin => write!(f, "round_robin"),
            LoadBalanceStrategy::Random => write!(f, "random"),
        }
    }
}

/// Pool-level errors
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no healthy JWT tokens available")]
    NoHealthyTokens,
}

/// A single credential and its health state
#[derive(Debug, Clone)]
pub struct TokenStatus {
    pub token: String,
    pub healthy: bool,
    pub last_used: SystemTime,
    pub error_count: u64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<i64>,
}

impl TokenStatus {
    fn from_entry(entry: &TokenEntry) -> Self {
        Self {
            token: entry.token.clone(),
            healthy: true,
            last_used: SystemTime::now(),
            error_count: 0,
            name: entry.name.clone(),
            description: entry.description.clone(),
            priority: entry.priority,
        }
    }
}

/// Pool of upstream JWT credentials.
///
/// The keyed map and every credential's flags are guarded by one RW lock;
/// the round-robin counter is a bare atomic incremented once per acquisition.
pub struct TokenPool {
    tokens: RwLock<HashMap<String, TokenStatus>>,
    strategy: LoadBalanceStrategy,
    counter: AtomicU64,
}

impl TokenPool {
    pub fn new(entries: &[TokenEntry], strategy: LoadBalanceStrategy) -> Self {
        let tokens = entries
            .iter()
            .map(|entry| (entry.token.clone(), TokenStatus::from_entry(entry)))
            .collect();

        Self {
            tokens: RwLock::new(tokens),
            strategy,
            counter: AtomicU64::new(0),
        }
    }

    pub fn strategy(&self) -> LoadBalanceStrategy {
        self.strategy
    }

    /// Select a healthy credential under the configured strategy.
    ///
    /// The healthy subset is enumerated in sorted key order so round-robin
    /// rotation visits each credential exactly once per cycle.
    pub fn acquire(&self) -> Result<String, PoolError> {
        let selected = {
            let tokens = self.tokens.read().expect("token pool lock poisoned");

            let mut healthy: Vec<&str> = tokens
                .values()
                .filter(|status| status.healthy)
                .map(|status| status.token.as_str())
                .collect();

            if healthy.is_empty() {
                return Err(PoolError::NoHealthyTokens);
            }
            healthy.sort_unstable();

            let index = match self.strategy {
                LoadBalanceStrategy::RoundRobin => {
                    self.counter.fetch_add(1, Ordering::Relaxed) as usize % healthy.len()
                }
                LoadBalanceStrategy::Random => {
                    rand::thread_rng().gen_range(0..healthy.len())
                }
            };

            healthy[index].to_string()
        };

        // A concurrent refresh may have replaced the set since selection;
        // the timestamp update is then a no-op.
        let mut tokens = self.tokens.write().expect("token pool lock poisoned");
        if let Some(status) = tokens.get_mut(&selected) {
            status.last_used = SystemTime::now();
        }

        Ok(selected)
    }

    /// Mark a credential healthy and reset its error counter.
    /// Unknown tokens are ignored.
    pub fn mark_healthy(&self, token: &str) {
        let mut tokens = self.tokens.write().expect("token pool lock poisoned");
        if let Some(status) = tokens.get_mut(token) {
            status.healthy = true;
            status.error_count = 0;
            info!(token = %token_preview(token), "JWT token marked as healthy");
        }
    }

    /// Mark a credential unhealthy and bump its error counter.
    /// Unknown tokens are ignored.
    pub fn mark_unhealthy(&self, token: &str) {
        let mut tokens = self.tokens.write().expect("token pool lock poisoned");
        if let Some(status) = tokens.get_mut(token) {
            status.healthy = false;
            status.error_count += 1;
            warn!(
                token = %token_preview(token),
                errors = status.error_count,
                "JWT token marked as unhealthy"
            );
        }
    }

    pub fn healthy_count(&self) -> usize {
        let tokens = self.tokens.read().expect("token pool lock poisoned");
        tokens.values().filter(|status| status.healthy).count()
    }

    pub fn total_count(&self) -> usize {
        let tokens = self.tokens.read().expect("token pool lock poisoned");
        tokens.len()
    }

    /// Snapshot of all credential keys, for the health prober.
    pub fn token_keys(&self) -> Vec<String> {
        let tokens = self.tokens.read().expect("token pool lock poisoned");
        tokens.keys().cloned().collect()
    }

    /// Replace the whole credential set with fresh healthy entries.
    ///
    /// The round-robin counter is deliberately not reset; modulo over the
    /// new size still yields a valid index.
    pub fn refresh(&self, entries: &[TokenEntry]) {
        let fresh: HashMap<String, TokenStatus> = entries
            .iter()
            .map(|entry| (entry.token.clone(), TokenStatus::from_entry(entry)))
            .collect();

        let mut tokens = self.tokens.write().expect("token pool lock poisoned");
        *tokens = fresh;
        info!(total = tokens.len(), "JWT tokens refreshed");
    }
}

/// Short loggable form of a credential: first 10 characters plus an ellipsis.
pub fn token_preview(token: &str) -> String {
    let cut = token
        .char_indices()
        .nth(10)
        .map(|(i, _)| i)
        .unwrap_or(token.len());
    format!("{}...", &token[..cut])
}
