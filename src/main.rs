//! SOL transfer relay server
//!
//! Serves `/api/send-sol` and `/api/confirm-transaction` in front of a
//! Solana RPC node.

#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sol_relay::config::Config;
use sol_relay::endpoints::{create_router, AppState};
use sol_relay::rpc::{ChainClient, SolanaRpc};
use sol_relay::submission::{ConfirmPolicy, TransactionSubmitter};
use sol_relay::tx_builder::TransferBuilder;
use sol_relay::TransferPolicy;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "SOL_RELAY_CONFIG", default_value = "config.toml")]
    config: String,

    /// Override the listen port from the config file
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs);

    info!("🚀 Starting SOL transfer relay");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    info!("📋 Loading configuration from: {}", args.config);
    let mut config = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let policy = TransferPolicy::default();
    info!("💸 Policy: {}", policy.describe());

    info!("🌐 RPC endpoint: {}", config.rpc.url);
    let rpc: Arc<dyn ChainClient> = Arc::new(SolanaRpc::new(&config.rpc));

    let builder = TransferBuilder::new(Arc::clone(&rpc), policy);
    let submitter = TransactionSubmitter::new(rpc, ConfirmPolicy::from(&config.rpc));
    let router = create_router(AppState::new(builder, submitter));

    let addr = config.server.listen_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✅ Relay listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("👋 Relay stopped");
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) {
    let env_filter = if verbose {
        "sol_relay=debug,tower_http=debug,info"
    } else {
        "sol_relay=info,tower_http=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("🛑 Shutdown signal received");
}
