//! Signal-driven cancellation.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// A token cancelled on the first Ctrl+C or SIGTERM.
///
/// Work in progress observes the token at its next checkpoint; an in-flight
/// request is allowed to finish.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });
    token
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, stopping at the next safe point");
        }
        _ = terminate => {
            warn!("Received SIGTERM, stopping at the next safe point");
        }
    }
}
