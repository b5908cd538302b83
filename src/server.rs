//! HTTP serving with a bounded drain.
//!
//! Graceful shutdown in axum waits for every open connection. A paused
//! player holds its stream open indefinitely, so the drain is cut off
//! `drain_timeout` after the shutdown signal fires.

use std::future::{Future, IntoFuture};
use std::io;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Serves `app` until `signal` resolves, then waits at most `drain_timeout`
/// for in-flight requests before returning.
pub async fn serve_with_drain<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    drain_timeout: Duration,
) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let stopping = CancellationToken::new();
    let notify = stopping.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            notify.cancel();
        })
        .into_future();

    let drain_deadline = async {
        stopping.cancelled().await;
        tokio::time::sleep(drain_timeout).await;
    };

    tokio::select! {
        result = server => {
            info!("All connections drained");
            result
        }
        _ = drain_deadline => {
            warn!(
                "Open connections did not drain within {:?}, closing them",
                drain_timeout
            );
            Ok(())
        }
    }
}
