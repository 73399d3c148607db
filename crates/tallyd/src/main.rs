//! tallyd — the tally metrics server.
//!
//! Single binary that assembles the server:
//! - Metric store (in-memory)
//! - Persistence backend (Postgres, JSON file, or none)
//! - Persistence scheduler (startup restore + periodic dumps)
//! - HTTP API
//!
//! # Usage
//!
//! ```text
//! tallyd -a 0.0.0.0:8080 -i 300 -f /var/lib/tally/metrics.json -r true
//! DATABASE_DSN=postgres://tally@db/tally tallyd
//! ```

mod config;

use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use tally_persist::{Backend, PersistenceScheduler};
use tally_store::MetricStore;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("info,tallyd=debug,tally_persist=debug")
            }),
        )
        .init();

    let config = Config::parse();
    run(config).await
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!(
        address = %config.address,
        store_interval = config.store_interval,
        restore = config.restore,
        "tally server starting"
    );

    // ── Initialize subsystems ──────────────────────────────────

    let backend = Arc::new(Backend::select(&config.backend_config())?);
    let store = MetricStore::new();
    let scheduler = Arc::new(PersistenceScheduler::new(
        backend.clone(),
        config.scheduler_config(),
    ));

    // Restore completes before the listener opens.
    scheduler.restore(&store).await;

    // ── Background persistence ─────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let persist_handle = {
        let scheduler = scheduler.clone();
        let store = store.clone();
        tokio::spawn(async move {
            scheduler.run(store, shutdown_rx).await;
        })
    };

    // ── Start API server ───────────────────────────────────────

    let router = tally_api::build_router(store, backend);
    let listener = tokio::net::TcpListener::bind(&config.address).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let the scheduler flush once more before exit.
    // Err only if the scheduler task already exited and dropped the receiver.
    shutdown_tx.send(true).ok();
    if let Err(e) = persist_handle.await {
        error!(error = %e, "persistence task failed");
    }

    info!("tally server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl-C handler");
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
                error!(error = %e, "failed to install SIGTERM handler");
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
    info!("shutdown signal received");
}
