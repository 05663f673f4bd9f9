//! # ThreadFlow Monitor
//!
//! Command-line front end for the completion sync engines.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Monitor Process                                  │
//! │                                                                         │
//! │  CLI args ──► SyncConfig (TOML + env) ──► SyncFacade ──► completions    │
//! │                                              │                │         │
//! │                                              ▼                ▼         │
//! │                                         status watch      TaskBoard     │
//! │                                                                         │
//! │  Ctrl-C / SIGTERM ──► facade.stop() ──► exit                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod board;
mod commands;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use threadflow_sync::{SyncConfig, TransportKind};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Watches task completions from a ThreadFlow server.
#[derive(Parser)]
#[command(name = "threadflow-monitor")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a sync.toml configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging for the sync engines
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream completions until interrupted
    Watch {
        /// Transport to use (poll, push); overrides the config file
        #[arg(short, long)]
        transport: Option<TransportKind>,
    },

    /// Submit a task
    Submit {
        /// Task description
        payload: String,

        /// Priority from 1 (low) to 10 (high)
        #[arg(short, long, default_value = "1")]
        priority: i64,

        /// Keep running until the task completes
        #[arg(short, long)]
        watch: bool,
    },

    /// Probe the server once
    Health,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config)?;
    info!(
        api_url = %config.server.api_url,
        ws_url = %config.server.ws_url,
        transport = %config.transport(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Watch { transport } => commands::watch(config, transport).await,
        Commands::Submit {
            payload,
            priority,
            watch,
        } => commands::submit(config, &payload, priority, watch).await,
        Commands::Health => commands::health(&config).await,
    }
}

/// Installs the fmt subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "threadflow_sync=debug,threadflow_monitor=debug,info"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(true)
        .init();
}

/// An explicit `--config` must load; otherwise fall back to defaults.
fn load_config(path: Option<PathBuf>) -> anyhow::Result<SyncConfig> {
    match path {
        Some(path) => SyncConfig::load(Some(path.clone()))
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(SyncConfig::load_or_default(None)),
    }
}

/// Resolves on Ctrl-C or SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping sync...");
}
