//! Graceful shutdown for the HTTP listener.
//!
//! On the shutdown signal the listener stops accepting connections and
//! in-flight requests get up to `grace` to finish. Anything still running
//! after that is dropped.

use axum::Router;
use std::future::{Future, IntoFuture};
use std::io;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// How the listener stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// Every in-flight request finished within the grace period.
    Completed,
    /// The grace period ran out and remaining requests were dropped.
    TimedOut,
}

/// Serve `app` until `signal` resolves, then drain for at most `grace`.
///
/// # Errors
///
/// Returns the listener's I/O error if serving fails.
pub async fn serve_with_grace<F>(
    listener: TcpListener,
    app: Router,
    signal: F,
    grace: Duration,
) -> io::Result<Drain>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            let _ = signalled_tx.send(());
        })
        .into_future();
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => return result.map(|()| Drain::Completed),
        Ok(()) = signalled_rx => {}
    }

    info!(grace_ms = grace.as_millis(), "Draining in-flight requests");
    if let Ok(result) = tokio::time::timeout(grace, serve).await {
        result.map(|()| Drain::Completed)
    } else {
        warn!("In-flight requests did not finish within the shutdown timeout");
        Ok(Drain::TimedOut)
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
