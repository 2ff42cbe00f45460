//! Signal handling
//!
//! Resolves on SIGINT (Ctrl+C) or SIGTERM so the caller can stop every
//! provider before the process exits.

use tracing::{info, warn};

/// Wait for the first shutdown signal
pub async fn signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                    _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                }
                return;
            }
            Err(err) => warn!("failed to install SIGTERM handler: {err}"),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl+C: {err}");
        std::future::pending::<()>().await;
    }
    info!("received Ctrl+C, initiating shutdown");
}
