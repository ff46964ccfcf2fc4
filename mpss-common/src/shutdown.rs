//! Shutdown signalling shared by the MPSS binaries.

use tokio_util::sync::CancellationToken;

/// Spawns a task that cancels the returned token on Ctrl-C or SIGTERM.
///
/// Services watch the token to drive their graceful shutdown; internal
/// components may also cancel it themselves to take the whole process
/// down (the board does this once every node has reported `Kill`).
pub fn spawn_shutdown_task() -> CancellationToken {
    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            shutdown_signal().await;
            tracing::info!("received shutdown signal");
            token.cancel();
        }
    });
    token
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("can install the Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("can install the SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
