//! Command line surface.
//!
//! Short `-h` selects the listen host, so the auto help flag is long-only.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::CliOverrides;

#[derive(Debug, Parser)]
#[command(
    name = "jetbrains-ai-proxy",
    version,
    about = "OpenAI-compatible proxy for the JetBrains AI chat endpoint",
    disable_help_flag = true
)]
pub struct Cli {
    /// Server listen port (overrides config)
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Server listen host (overrides config)
    #[arg(short = 'h', long = "host")]
    pub host: Option<String>,

    /// Comma-separated JWT tokens (overrides config)
    #[arg(short = 'c', long = "jwt-tokens")]
    pub jwt_tokens: Option<String>,

    /// Bearer token clients must present (overrides config)
    #[arg(short = 'k', long = "bearer-token")]
    pub bearer_token: Option<String>,

    /// Load balance strategy: round_robin or random (overrides config)
    #[arg(short = 's', long = "strategy")]
    pub strategy: Option<String>,

    /// Config file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Write example configuration files and exit
    #[arg(long = "generate-config", action = ArgAction::SetTrue)]
    pub generate_config: bool,

    /// Print the resolved configuration and exit
    #[arg(long = "print-config", action = ArgAction::SetTrue)]
    pub print_config: bool,

    /// Print help
    #[arg(long = "help", action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            host: self.host.clone(),
            jwt_tokens: self.jwt_tokens.clone(),
            bearer_token: self.bearer_token.clone(),
            strategy: self.strategy.clone(),
            config_file: self.config.clone(),
        }
    }
}
