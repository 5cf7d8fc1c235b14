//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the metrics endpoint when enabled
//! - Create the cache and bind the listener
//! - Run the accept loop until Ctrl+C, then give in-flight connections a
//!   bounded amount of time to finish
//!
//! Any failure here is fatal. Logging is installed by the caller first so
//! that these steps are visible.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinError;

use crate::config::ProxyConfig;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;

/// Run the proxy with a validated configuration.
pub async fn run(config: ProxyConfig) -> Result<(), ListenerError> {
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        max_cache_size = config.cache.max_cache_size,
        max_object_size = config.cache.max_object_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;
    let drain_timeout = Duration::from_secs(config.lifecycle.drain_timeout_secs);

    let server = HttpServer::new(config);
    let tracker = server.tracker();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    tokio::select! {
        result = server_task => return accept_loop_result(result),
        _ = signals::shutdown_signal() => {
            shutdown.trigger();
        }
    }

    if !tracker.wait_until_idle(drain_timeout).await {
        tracing::warn!(
            active_connections = tracker.active_count(),
            "Connections still open after drain timeout"
        );
    }
    Ok(())
}

/// Flatten the accept-loop task result; a panicked loop is an accept failure.
fn accept_loop_result(
    result: Result<Result<(), ListenerError>, JoinError>,
) -> Result<(), ListenerError> {
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Accept loop panicked");
            Err(ListenerError::Accept(std::io::Error::other(e)))
        }
    }
}
