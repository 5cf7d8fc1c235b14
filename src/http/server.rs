//! Proxy server: accept loop and worker spawning.
//!
//! # Responsibilities
//! - Own the process-wide object cache
//! - Accept client connections and spawn one detached worker per connection
//! - Tag each worker with a tracing span carrying its connection ID
//! - Stop accepting when shutdown is signalled

use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::cache::ObjectCache;
use crate::config::ProxyConfig;
use crate::http::worker::{handle_connection, ProxyContext};
use crate::net::{ConnectionTracker, Listener, ListenerError};

/// Caching forward proxy server.
pub struct HttpServer {
    config: ProxyConfig,
    context: ProxyContext,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new server with a fresh cache sized from the configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let cache = ObjectCache::from_config(&config.cache);
        Self::with_cache(config, cache)
    }

    /// Create a server around an existing cache handle.
    pub fn with_cache(config: ProxyConfig, cache: ObjectCache) -> Self {
        let context = ProxyContext::new(&config, cache);
        Self {
            config,
            context,
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle to the shared cache.
    pub fn cache(&self) -> &ObjectCache {
        &self.context.cache
    }

    /// Handle to the active-connection tracker.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Accept connections until shutdown is signalled or accepting fails.
    ///
    /// Workers are never joined; the ones still running when this returns
    /// keep going on the runtime.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "Proxy server accepting connections");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.spawn_worker(stream, peer),
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed");
                            return Err(e);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(
                        active_connections = self.tracker.active_count(),
                        "Shutdown signal received, no longer accepting"
                    );
                    break;
                }
            }
        }

        Ok(())
    }

    fn spawn_worker(&self, stream: TcpStream, peer: SocketAddr) {
        let guard = self.tracker.track();
        let span = tracing::info_span!("connection", id = %guard.id(), peer = %peer);
        let context = self.context.clone();

        tokio::spawn(
            async move {
                let _guard = guard;
                handle_connection(stream, &context).await;
            }
            .instrument(span),
        );
    }
}
