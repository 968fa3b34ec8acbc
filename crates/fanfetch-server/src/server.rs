//! Serving with a two-phase shutdown.
//!
//! On the shutdown signal the listener stops accepting and in-flight requests
//! keep running. Batches still running once the grace period has elapsed are
//! cancelled through the shutdown token and answer 503.

use std::future::Future;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

/// Serve `app` until `signal` resolves and every open request has finished.
///
/// `shutdown` must be the token the app's batches run under; it is cancelled
/// `grace` after `signal` resolves if requests are still being handled.
pub async fn serve<S>(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
    signal: S,
    grace: Duration,
) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let draining = CancellationToken::new();

    let _grace_timer = AbortOnDropHandle::new(tokio::spawn({
        let draining = draining.clone();
        async move {
            draining.cancelled().await;
            tokio::time::sleep(grace).await;
            tracing::warn!(?grace, "Grace period elapsed, cancelling in-flight batches");
            shutdown.cancel();
        }
    }));

    let graceful = async move {
        signal.await;
        tracing::info!(?grace, "Draining in-flight requests");
        draining.cancel();
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
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
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
