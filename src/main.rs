//! JetBrains AI Proxy
//!
//! Entry point for the proxy server.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use jetbrains_ai_proxy::cli::Cli;
use jetbrains_ai_proxy::config::Config;
use jetbrains_ai_proxy::{routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jetbrains_ai_proxy=info,tower_http=info".into()),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    if cli.generate_config {
        Config::generate_example()?;
        return Ok(());
    }

    let overrides = cli.overrides();
    let config = Config::load(&overrides).context("configuration error")?;

    if cli.print_config {
        config.print();
        return Ok(());
    }

    info!(
        tokens = config.jetbrains_tokens.len(),
        strategy = %config.load_balance_strategy,
        interval = ?config.health_check_interval,
        "JWT pool configured"
    );

    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .context("invalid listen address")?;

    let state = AppState::new(config, overrides)?;
    state.prober.start().await;

    let app = routes::create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.prober.stop().await;
    info!("shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("received Ctrl+C, shutting down");
        }
        _ = terminate => {
            warn!("received SIGTERM, shutting down");
        }
    }
}
