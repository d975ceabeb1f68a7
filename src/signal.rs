// src/signal.rs
// =============================================================================
// Bridges SIGINT / SIGTERM to the root cancellation token.
//
// The engine knows nothing about signals; it only watches its token. This
// task cancels that token on the first signal, so in-flight fetches are
// aborted and pending URLs are dropped.
// =============================================================================

use tokio_util::sync::CancellationToken;

/// Cancels `token` on SIGINT or SIGTERM. Returns early if the token is
/// cancelled some other way.
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("cancelling pending fetches");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Registration can fail in restricted environments, fall back to what works
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register signal handlers, using ctrl_c fallback");
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            // Never cancel because of a broken listener
            std::future::pending::<()>().await;
        }
    }
}

// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Only the first signal counts
//    - After it the token is cancelled and the task returns
//    - tokio keeps its handler installed, so later signals do not kill the
//      process; shutdown still waits for the workers to wind down
// -----------------------------------------------------------------------------
