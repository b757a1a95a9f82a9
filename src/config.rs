//! Configuration management.
//!
//! Settings merge from four layers, highest priority first: command line,
//! environment variables, a discovered JSON config file, built-in defaults.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::balancer::pool::LoadBalanceStrategy;

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://api.jetbrains.ai";
const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);
const EXAMPLE_CONFIG_PATH: &str = "config/config.json";
const ENV_EXAMPLE_PATH: &str = ".env.example";

/// One configured JWT credential with optional descriptive metadata.
/// The metadata is informational and never affects selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// Command-line overrides, applied on top of env and file settings.
/// Kept around so `/reload` re-runs the load with the same precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub jwt_tokens: Option<String>,
    pub bearer_token: Option<String>,
    pub strategy: Option<String>,
    pub config_file: Option<PathBuf>,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub jetbrains_tokens: Vec<TokenEntry>,
    pub bearer_token: String,
    pub load_balance_strategy: LoadBalanceStrategy,
    pub health_check_interval: Duration,
    pub server_host: String,
    pub server_port: u16,
    pub upstream_base_url: String,
    pub upstream_insecure_tls: bool,
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jetbrains_tokens: Vec::new(),
            bearer_token: String::new(),
            load_balance_strategy: LoadBalanceStrategy::RoundRobin,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            upstream_insecure_tls: false,
            config_path: None,
        }
    }
}

/// Raw config file shape; every field optional so partial files merge
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    jetbrains_tokens: Vec<TokenEntry>,
    bearer_token: Option<String>,
    load_balance_strategy: Option<String>,
    health_check_interval: Option<String>,
    server_host: Option<String>,
    server_port: Option<u16>,
    upstream_base_url: Option<String>,
    upstream_insecure_tls: Option<bool>,
}

impl Config {
    /// Load configuration with the full precedence chain and validate it.
    pub fn load(overrides: &CliOverrides) -> Result<Self> {
        let mut config = Config::default();

        match discover_config_file(overrides.config_file.as_deref()) {
            Some(path) => {
                if let Err(err) = config.apply_file(&path) {
                    warn!(path = %path.display(), error = %err, "failed to load config file");
                }
            }
            None => info!("no config file found, using environment and defaults"),
        }

        config.apply_env();
        config.apply_overrides(overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<()> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&data)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        if !file.jetbrains_tokens.is_empty() {
            self.jetbrains_tokens = file.jetbrains_tokens;
        }
        if let Some(bearer) = file.bearer_token {
            self.bearer_token = bearer;
        }
        if let Some(strategy) = file.load_balance_strategy {
            self.load_balance_strategy = LoadBalanceStrategy::parse(&strategy);
        }
        if let Some(interval) = file.health_check_interval {
            match parse_duration(&interval) {
                Some(parsed) => self.health_check_interval = parsed,
                None => warn!(value = %interval, "invalid health_check_interval, keeping previous"),
            }
        }
        if let Some(host) = file.server_host {
            self.server_host = host;
        }
        if let Some(port) = file.server_port {
            self.server_port = port;
        }
        if let Some(url) = file.upstream_base_url {
            self.upstream_base_url = url;
        }
        if let Some(insecure) = file.upstream_insecure_tls {
            self.upstream_insecure_tls = insecure;
        }

        self.config_path = Some(path.to_path_buf());
        info!(path = %path.display(), "loaded config file");
        Ok(())
    }

    fn apply_env(&mut self) {
        let tokens = std::env::var("JWT_TOKENS")
            .or_else(|_| std::env::var("JWT_TOKEN"))
            .unwrap_or_default();
        if !tokens.is_empty() {
            let parsed = parse_token_list(&tokens);
            if !parsed.is_empty() {
                self.jetbrains_tokens = parsed;
            }
        }

        if let Ok(bearer) = std::env::var("BEARER_TOKEN") {
            if !bearer.is_empty() {
                self.bearer_token = bearer;
            }
        }

        if let Ok(strategy) = std::env::var("LOAD_BALANCE_STRATEGY") {
            if !strategy.is_empty() {
                self.load_balance_strategy = LoadBalanceStrategy::parse(&strategy);
            }
        }

        if let Ok(host) = std::env::var("SERVER_HOST") {
            if !host.is_empty() {
                self.server_host = host;
            }
        }

        if let Ok(port) = std::env::var("SERVER_PORT") {
            if !port.is_empty() {
                match port.parse::<u16>() {
                    Ok(parsed) => self.server_port = parsed,
                    Err(_) => warn!(value = %port, "invalid SERVER_PORT, keeping previous"),
                }
            }
        }
    }

    fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(tokens) = &overrides.jwt_tokens {
            let parsed = parse_token_list(tokens);
            if !parsed.is_empty() {
                self.jetbrains_tokens = parsed;
            }
        }
        if let Some(bearer) = &overrides.bearer_token {
            self.bearer_token = bearer.clone();
        }
        if let Some(strategy) = &overrides.strategy {
            self.load_balance_strategy = LoadBalanceStrategy::parse(strategy);
        }
        if let Some(host) = &overrides.host {
            self.server_host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.server_port = port;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.jetbrains_tokens.is_empty() {
            bail!("no JWT tokens configured");
        }
        if self.jetbrains_tokens.iter().any(|entry| entry.token.is_empty()) {
            bail!("empty JWT token in configuration");
        }
        if self.bearer_token.is_empty() {
            bail!("bearer token is required");
        }
        if self.server_port == 0 {
            bail!("invalid server port: 0");
        }
        Ok(())
    }

    /// Summary for the admin surface. Credentials appear as previews only.
    pub fn summary(&self) -> Value {
        let tokens: Vec<Value> = self
            .jetbrains_tokens
            .iter()
            .map(|entry| {
                json!({
                    "name": entry.name,
                    "description": entry.description,
                    "priority": entry.priority,
                    "token_preview": preview(&entry.token, 20),
                })
            })
            .collect();

        json!({
            "jwt_tokens_count": self.jetbrains_tokens.len(),
            "jwt_tokens": tokens,
            "bearer_token_set": !self.bearer_token.is_empty(),
            "load_balance_strategy": self.load_balance_strategy.to_string(),
            "health_check_interval": format_duration(self.health_check_interval),
            "server_host": self.server_host,
            "server_port": self.server_port,
            "config_file": self.config_path.as_ref().map(|p| p.display().to_string()),
        })
    }

    /// Print the resolved configuration, with credential previews only.
    pub fn print(&self) {
        println!("=== Current Configuration ===");
        println!("JWT Tokens: {} configured", self.jetbrains_tokens.len());
        for (i, entry) in self.jetbrains_tokens.iter().enumerate() {
            println!(
                "  {}. {} ({})",
                i + 1,
                entry.name.as_deref().unwrap_or("unnamed"),
                preview(&entry.token, 20)
            );
        }
        println!("Bearer Token: {}", preview(&self.bearer_token, 20));
        println!("Load Balance Strategy: {}", self.load_balance_strategy);
        println!(
            "Health Check Interval: {}",
            format_duration(self.health_check_interval)
        );
        println!("Server: {}:{}", self.server_host, self.server_port);
        if let Some(path) = &self.config_path {
            println!("Config File: {}", path.display());
        }
        println!("=============================");
    }

    /// Write example configuration files (`config/config.json` and
    /// `.env.example`) for a first-time setup.
    pub fn generate_example() -> Result<()> {
        let example = json!({
            "jetbrains_tokens": [
                {
                    "token": "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9...",
                    "name": "Primary_JWT",
                    "description": "Primary JWT token for JetBrains AI",
                    "priority": 1,
                    "metadata": {"environment": "production", "region": "us-east-1"}
                },
                {
                    "token": "eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9...",
                    "name": "Secondary_JWT",
                    "description": "Secondary JWT token for load balancing",
                    "priority": 2,
                    "metadata": {"environment": "production", "region": "us-west-2"}
                }
            ],
            "bearer_token": "your_bearer_token_here",
            "load_balance_strategy": "round_robin",
            "health_check_interval": "30s",
            "server_host": "0.0.0.0",
            "server_port": 8080
        });

        let path = Path::new(EXAMPLE_CONFIG_PATH);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&example)?)
            .with_context(|| format!("failed to write {}", path.display()))?;

        let env_example = "\
# JetBrains AI Proxy Configuration
# Copy this file to .env and fill in your actual values

# Multiple JWT tokens (comma-separated)
JWT_TOKENS=eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9...,eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9...

# Or a single JWT token
# JWT_TOKEN=eyJ0eXAiOiJKV1QiLCJhbGciOiJIUzI1NiJ9...

# Bearer token for API authentication
BEARER_TOKEN=your_bearer_token_here

# Load balancing strategy: round_robin or random
LOAD_BALANCE_STRATEGY=round_robin

# Server configuration
SERVER_HOST=0.0.0.0
SERVER_PORT=8080

# Alternative: specify a config file path
# CONFIG_FILE=config/config.json
";
        std::fs::write(ENV_EXAMPLE_PATH, env_example)
            .with_context(|| format!("failed to write {ENV_EXAMPLE_PATH}"))?;

        println!("Example configuration files generated:");
        println!("  {EXAMPLE_CONFIG_PATH}");
        println!("  {ENV_EXAMPLE_PATH}");
        println!("Edit them with your actual JWT tokens, then restart.");

        Ok(())
    }
}

/// Parse a comma-separated credential list into entries named `JWT_1`, ...
pub fn parse_token_list(raw: &str) -> Vec<TokenEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .enumerate()
        .map(|(i, token)| TokenEntry {
            token: token.to_string(),
            name: Some(format!("JWT_{}", i + 1)),
            description: None,
            priority: Some(1),
            metadata: None,
        })
        .collect()
}

/// Search the well-known locations for a config file. First hit wins.
fn discover_config_file(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var("CONFIG_FILE") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let mut candidates: Vec<PathBuf> = vec![
        "config.json".into(),
        "config/config.json".into(),
        "configs/config.json".into(),
        ".config/jetbrains-ai-proxy.json".into(),
    ];
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".config/jetbrains-ai-proxy/config.json"));
    }
    candidates.push("/etc/jetbrains-ai-proxy/config.json".into());

    candidates.into_iter().find(|path| path.is_file())
}

/// Parse a duration string like `30s`, `1m30s`, `500ms`, `1h`, or a plain
/// number of seconds.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<f64>() {
        if secs <= 0.0 {
            return None;
        }
        return Some(Duration::from_secs_f64(secs));
    }

    let mut total_ms: f64 = 0.0;
    let mut chars = value.chars().peekable();
    let mut number = String::new();

    while chars.peek().is_some() {
        number.clear();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() || c == '.' {
                number.push(c);
                chars.next();
            } else {
                break;
            }
        }
        if number.is_empty() {
            return None;
        }
        let amount: f64 = number.parse().ok()?;

        let mut unit = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                unit.push(c);
                chars.next();
            } else {
                break;
            }
        }

        total_ms += match unit.as_str() {
            "ms" => amount,
            "s" | "" => amount * 1_000.0,
            "m" => amount * 60_000.0,
            "h" => amount * 3_600_000.0,
            _ => return None,
        };
    }

    if total_ms <= 0.0 {
        return None;
    }
    Some(Duration::from_millis(total_ms as u64))
}

/// Render a duration the way config files spell it
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() != 0 {
        return format!("{}ms", duration.as_millis());
    }
    let secs = duration.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{secs}s")
    }
}

fn preview(value: &str, max: usize) -> String {
    let cut = value
        .char_indices()
        .nth(max)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    format!("{}...", &value[..cut])
}
