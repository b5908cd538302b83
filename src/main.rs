//! Media Server - streams a local media directory over HTTP
//!
//! Serves byte ranges of media files plus a small JSON API for directory
//! listings, cache control and metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use media_server::{
    create_router, serve_with_drain, spawn_metrics_task, spawn_sweep_task, AppState,
    BackgroundTasks, Config,
};

/// Main entry point for the media server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build cache, worker pool, buffer pool and stream counters
/// 4. Start the cache sweep and metrics sampler
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. On SIGINT/SIGTERM drain connections for at most the shutdown timeout,
///    then stop the background tasks and the worker pool
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "media_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting media server");

    let mut config = Config::from_env();
    config
        .prepare_media_dir()
        .with_context(|| format!("cannot use media directory {}", config.media_dir.display()))?;
    info!(
        "Configuration loaded: media_dir={}, port={}, cache_max_entries={}, cache_max_memory={}, workers={}, queue={}",
        config.media_dir.display(),
        config.server_port,
        config.cache_max_entries,
        config.cache_max_memory,
        config.worker_count,
        config.worker_queue_size
    );

    let state = AppState::from_config(&config)
        .await
        .context("failed to initialise application state")?;
    info!("Cache, worker pool and buffer pool initialized");

    let mut tasks = BackgroundTasks::new();
    tasks.push(
        "cache-sweep",
        spawn_sweep_task(
            state.cache.clone(),
            Duration::from_secs(config.sweep_interval),
            tasks.token(),
        ),
    );
    tasks.push(
        "metrics",
        spawn_metrics_task(
            Arc::clone(&state.metrics),
            Duration::from_secs(config.metrics_interval),
            tasks.token(),
        ),
    );
    info!("Background tasks started");

    let pool = Arc::clone(&state.pool);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    serve_with_drain(listener, app, shutdown_signal(), config.shutdown_timeout())
        .await
        .context("server error")?;

    tasks.shutdown(config.shutdown_timeout()).await;
    pool.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
