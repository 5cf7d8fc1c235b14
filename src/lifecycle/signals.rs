//! OS signal handling.
//!
//! Ctrl+C (SIGINT) stops the accept loop. SIGPIPE needs no handling: the
//! Rust runtime already ignores it, so a vanished peer surfaces as an
//! `io::Error` on the worker that wrote to it.

/// Wait for Ctrl+C.
///
/// If the handler cannot be installed this never resolves, and the proxy
/// runs until killed.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
