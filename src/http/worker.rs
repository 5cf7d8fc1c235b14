//! Per-connection request lifecycle.
//!
//! ```text
//! Accepted ─parse─▶ Parsed ─lookup─▶ HitServed ────────┐
//!     │               │                                 │
//!     │               └─miss─▶ forward ─▶ MissForwarded ┤
//!     │                           │                     │
//!     └──────────▶ Rejected ◀─────┘ (connect/transport) ┴─▶ Closed
//! ```
//!
//! The cache lock is only ever taken for the lookup and the insert; all
//! socket I/O happens outside it.

use std::time::Instant;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::cache::{InsertOutcome, ObjectCache};
use crate::config::{LimitsConfig, ProxyConfig};
use crate::http::error::ProxyError;
use crate::http::forward::Forwarder;
use crate::http::headers::{read_client_headers, request_head};
use crate::http::request::read_request;
use crate::http::response::ErrorPage;
use crate::net::connection::ConnectionState;
use crate::observability::metrics;

/// Everything a worker needs, shared by all connections.
#[derive(Clone)]
pub struct ProxyContext {
    pub cache: ObjectCache,
    pub forwarder: Forwarder,
    pub limits: LimitsConfig,
    pub legacy_status_codes: bool,
}

impl ProxyContext {
    pub fn new(config: &ProxyConfig, cache: ObjectCache) -> Self {
        Self {
            cache,
            forwarder: Forwarder::new(&config.cache, &config.limits),
            limits: config.limits.clone(),
            legacy_status_codes: config.responses.legacy_status_codes,
        }
    }
}

/// Serve one client connection to completion and close it.
///
/// Returns the state the connection reached before closing.
pub async fn handle_connection<S>(stream: S, ctx: &ProxyContext) -> ConnectionState
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let (read_half, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(read_half);
    tracing::debug!(state = %ConnectionState::Accepted, "Connection opened");

    let outcome = serve(&mut reader, &mut writer, ctx).await;
    debug_assert!(outcome.is_outcome());

    if let Err(e) = writer.shutdown().await {
        tracing::trace!(error = %e, "Client shutdown failed");
    }
    tracing::debug!(
        state = %ConnectionState::Closed,
        outcome = %outcome,
        elapsed = ?started.elapsed(),
        "Connection closed"
    );
    metrics::record_connection(outcome, started);
    outcome
}

async fn serve<R, W>(reader: &mut R, writer: &mut W, ctx: &ProxyContext) -> ConnectionState
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let request = match read_request(reader, &ctx.limits).await {
        Ok(request) => request,
        Err(err) => return reject(writer, &err, ctx).await,
    };
    let headers = match read_client_headers(reader, &ctx.limits).await {
        Ok(headers) => headers,
        Err(err) => return reject(writer, &err, ctx).await,
    };
    tracing::debug!(
        state = %ConnectionState::Parsed,
        host = %request.host,
        port = %request.port,
        path = %request.path,
        "Request parsed"
    );

    let key = request.cache_key();
    if let Some(object) = ctx.cache.lookup(&key).await {
        tracing::debug!(key = %key, bytes = object.len(), "Cache hit");
        let written = async {
            writer.write_all(&object).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            tracing::debug!(key = %key, error = %e, "Client went away during cached reply");
        }
        return ConnectionState::HitServed;
    }
    tracing::debug!(key = %key, "Cache miss, forwarding");

    let head = request_head(&request, &headers);
    match ctx.forwarder.forward(&request, &head, writer).await {
        Ok(outcome) => {
            let status = outcome.status;
            let relayed = outcome.bytes_relayed;
            match outcome.into_cacheable() {
                Some(object) => match ctx.cache.insert(key.clone(), object).await {
                    InsertOutcome::Stored { evicted, .. } => {
                        tracing::debug!(key = %key, evicted, "Response cached");
                    }
                    InsertOutcome::Rejected(reason) => {
                        tracing::debug!(key = %key, ?reason, "Cache declined response");
                    }
                },
                None => tracing::debug!(key = %key, ?status, relayed, "Response not cacheable"),
            }
            ConnectionState::MissForwarded
        }
        Err(err @ ProxyError::Connect { .. }) => {
            metrics::record_upstream_error(err.kind());
            reject(writer, &err, ctx).await
        }
        Err(err) => {
            metrics::record_upstream_error(err.kind());
            if err.is_disconnect() {
                tracing::debug!(key = %key, error = %err, "Transfer abandoned");
            } else {
                tracing::warn!(key = %key, error = %err, "Transfer failed");
            }
            ConnectionState::Rejected
        }
    }
}

/// Send the error document for `err`, if it has one.
async fn reject<W>(writer: &mut W, err: &ProxyError, ctx: &ProxyContext) -> ConnectionState
where
    W: AsyncWrite + Unpin,
{
    match ErrorPage::for_error(err, ctx.legacy_status_codes) {
        Some(page) => {
            tracing::info!(status = page.status.code(), error = %err, "Request rejected");
            let sent = async {
                writer.write_all(page.render().as_bytes()).await?;
                writer.flush().await
            }
            .await;
            if let Err(e) = sent {
                tracing::debug!(error = %e, "Could not deliver error page");
            }
        }
        None => tracing::debug!(error = %err, "Connection abandoned"),
    }
    ConnectionState::Rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheKey;
    use bytes::Bytes;
    use tokio::io::{duplex, AsyncReadExt};

    fn context() -> ProxyContext {
        ProxyContext::new(&ProxyConfig::default(), ObjectCache::new())
    }

    async fn exchange(ctx: &ProxyContext, request: &str) -> (ConnectionState, String) {
        let (mut client, server) = duplex(64 * 1024);
        client.write_all(request.as_bytes()).await.unwrap();
        client.shutdown().await.unwrap();

        let state = handle_connection(server, ctx).await;

        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        (state, String::from_utf8_lossy(&response).into_owned())
    }

    #[tokio::test]
    async fn cache_hit_never_contacts_origin() {
        let ctx = context();
        // Nothing listens on the discard port; a miss would fail to connect.
        let cached = Bytes::from_static(b"HTTP/1.0 200 OK\r\n\r\ncached body");
        ctx.cache
            .insert(CacheKey::new("127.0.0.1", "/page.html"), cached.clone())
            .await;

        let (state, response) = exchange(
            &ctx,
            "GET http://127.0.0.1:9/page.html HTTP/1.0\r\nConnection: keep-alive\r\n\r\n",
        )
        .await;

        assert_eq!(state, ConnectionState::HitServed);
        assert_eq!(response.as_bytes(), &cached[..]);
    }

    #[tokio::test]
    async fn bad_method_gets_error_page() {
        let (state, response) = exchange(&context(), "POST http://x/y HTTP/1.0\r\n\r\n").await;

        assert_eq!(state, ConnectionState::Rejected);
        assert!(response.starts_with("HTTP/1.0 400 Bad Request"));
        assert!(response.contains("POST"));
    }

    #[tokio::test]
    async fn legacy_codes_apply() {
        let mut ctx = context();
        ctx.legacy_status_codes = true;

        let (_, response) = exchange(&ctx, "DELETE http://x/y HTTP/1.0\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.0 501 Not Implemented"));

        let (_, response) = exchange(&ctx, "GET http://x:/y HTTP/1.0\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.0 404 Not Found"));
    }

    #[tokio::test]
    async fn empty_connection_is_rejected() {
        let (state, response) = exchange(&context(), "").await;
        assert_eq!(state, ConnectionState::Rejected);
        assert!(response.starts_with("HTTP/1.0 400"));
    }

    #[tokio::test]
    async fn unreachable_origin_cites_host() {
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let ctx = context();
        let (state, response) = exchange(
            &ctx,
            &format!("GET http://127.0.0.1:{}/gone.html HTTP/1.0\r\n\r\n", port),
        )
        .await;

        assert_eq!(state, ConnectionState::Rejected);
        assert!(response.starts_with("HTTP/1.0 400 Bad Request"));
        assert!(response.contains("127.0.0.1"));
        assert!(ctx.cache.is_empty().await);
    }
}
