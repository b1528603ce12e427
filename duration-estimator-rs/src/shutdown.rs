//! Graceful shutdown on Ctrl-C or SIGTERM.

use std::fmt::Display;
use std::future::Future;

/// Wait for a signal listener to fire. A listener that fails to install
/// never fires, so the other signal can still stop the server.
pub async fn fire_or_park<F, E>(listener: F, signal: &str)
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    if let Err(err) = listener.await {
        tracing::error!(error = %err, "Failed to listen for {}", signal);
        std::future::pending::<()>().await;
    }
}

/// Resolves when the process is asked to stop
pub async fn shutdown_signal() {
    let ctrl_c = fire_or_park(tokio::signal::ctrl_c(), "ctrl-c");

    #[cfg(unix)]
    let terminate = fire_or_park(
        async {
            let mut signal =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
            signal.recv().await;
            Ok::<(), std::io::Error>(())
        },
        "SIGTERM",
    );

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
