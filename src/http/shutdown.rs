//! Signal handling for the demo binary.
//!
//! Resolves on SIGTERM or Ctrl+C so the caller can close the proxy and drain
//! the plain HTTP server.

/// Wait for Ctrl+C or SIGTERM.
///
/// Fails only if a signal handler cannot be installed.
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("Received Ctrl+C, shutting down");
            }
            _ = terminate.recv() => {
                tracing::info!("Received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Received Ctrl+C, shutting down");
    }

    Ok(())
}
