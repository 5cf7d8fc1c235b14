//! Origin forwarding.
//!
//! # Responsibilities
//! - Open a fresh connection to the origin (no pooling, no retry)
//! - Send the rewritten HTTP/1.0 request
//! - Relay the response to the client line by line as it arrives
//! - Keep a bounded copy of the response for the caching decision
//!
//! # Design Decisions
//! - The copy is dropped as soon as it would exceed the object limit; the
//!   rest of the response is still relayed
//! - Any read or write failure abandons the transfer and the copy
//! - No timeouts: a stalled origin stalls only its own connection

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::config::{CacheConfig, LimitsConfig};
use crate::http::error::ProxyError;
use crate::http::request::Request;

/// What came back from a completed origin exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardOutcome {
    /// Status code from the response's status line, if it had one.
    pub status: Option<u16>,
    /// Bytes written to the client.
    pub bytes_relayed: usize,
    /// The whole response, present only if it stayed within the object limit.
    pub object: Option<Bytes>,
}

impl ForwardOutcome {
    /// The response bytes if the response may be cached: status 200 and
    /// within the object limit.
    pub fn into_cacheable(self) -> Option<Bytes> {
        match self.status {
            Some(200) => self.object,
            _ => None,
        }
    }
}

/// Parse the status code out of an HTTP status line.
pub fn parse_status_code(line: &[u8]) -> Option<u16> {
    let line = std::str::from_utf8(line).ok()?;
    let mut parts = line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

/// Relays requests to origin servers.
#[derive(Debug, Clone)]
pub struct Forwarder {
    max_object_size: usize,
    chunk_size: usize,
}

impl Forwarder {
    pub fn new(cache: &CacheConfig, limits: &LimitsConfig) -> Self {
        Self {
            max_object_size: cache.max_object_size,
            chunk_size: limits.max_line_bytes,
        }
    }

    /// Connect to the request's origin, send `head`, and stream the
    /// response into `client`.
    pub async fn forward<W>(&self, request: &Request, head: &str, client: &mut W) -> Result<ForwardOutcome, ProxyError>
    where
        W: AsyncWrite + Unpin,
    {
        let origin = TcpStream::connect(request.origin_address())
            .await
            .map_err(|source| ProxyError::Connect {
                host: request.host.clone(),
                source,
            })?;
        tracing::debug!(origin = %request.origin_address(), "Connected to origin");

        let (read_half, mut write_half) = origin.into_split();
        write_half.write_all(head.as_bytes()).await?;

        let mut reader = BufReader::new(read_half);
        self.relay(&mut reader, client).await
    }

    /// Copy the origin response to the client, accumulating it up to the
    /// object limit.
    pub async fn relay<R, W>(&self, origin: &mut R, client: &mut W) -> Result<ForwardOutcome, ProxyError>
    where
        R: tokio::io::AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut object = Some(Vec::new());
        let mut line = Vec::with_capacity(self.chunk_size);
        let mut status = None;
        let mut relayed = 0;

        loop {
            line.clear();
            let n = (&mut *origin)
                .take(self.chunk_size as u64)
                .read_until(b'\n', &mut line)
                .await?;
            if n == 0 {
                break;
            }

            if relayed == 0 {
                status = parse_status_code(&line);
            }
            client.write_all(&line).await?;
            relayed += n;

            let fits = object
                .as_ref()
                .is_some_and(|buf| buf.len() + n <= self.max_object_size);
            if fits {
                if let Some(buf) = object.as_mut() {
                    buf.extend_from_slice(&line);
                }
            } else if object.take().is_some() {
                tracing::debug!(limit = self.max_object_size, "Response exceeds object limit, not caching");
            }
        }
        client.flush().await?;

        Ok(ForwardOutcome {
            status,
            bytes_relayed: relayed,
            object: object.map(Bytes::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    fn forwarder(max_object_size: usize) -> Forwarder {
        Forwarder {
            max_object_size,
            chunk_size: 64,
        }
    }

    /// A client socket whose peer has gone away.
    struct BrokenClient;

    impl AsyncWrite for BrokenClient {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<io::Result<usize>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)))
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[test]
    fn status_codes() {
        assert_eq!(parse_status_code(b"HTTP/1.0 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_code(b"HTTP/1.1 404 Not Found\r\n"), Some(404));
        assert_eq!(parse_status_code(b"<html>200</html>"), None);
        assert_eq!(parse_status_code(b"HTTP/1.0 2000 OK"), None);
        assert_eq!(parse_status_code(b""), None);
    }

    #[tokio::test]
    async fn relays_and_keeps_small_ok_response() {
        let response = b"HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\n\r\nhello\nworld";
        let mut origin: &[u8] = response;
        let mut client = Vec::new();

        let outcome = forwarder(1024).relay(&mut origin, &mut client).await.unwrap();
        assert_eq!(client, response);
        assert_eq!(outcome.status, Some(200));
        assert_eq!(outcome.bytes_relayed, response.len());
        assert_eq!(outcome.into_cacheable(), Some(Bytes::from_static(response)));
    }

    #[tokio::test]
    async fn long_lines_are_relayed_in_chunks() {
        let body = "z".repeat(500);
        let response = format!("HTTP/1.0 200 OK\r\n\r\n{}", body);
        let mut origin = response.as_bytes();
        let mut client = Vec::new();

        let outcome = forwarder(1024).relay(&mut origin, &mut client).await.unwrap();
        assert_eq!(client, response.as_bytes());
        assert_eq!(outcome.object.map(|b| b.len()), Some(response.len()));
    }

    #[tokio::test]
    async fn oversized_response_is_relayed_but_not_kept() {
        let response = format!("HTTP/1.0 200 OK\r\n\r\n{}", "a\n".repeat(100));
        let mut origin = response.as_bytes();
        let mut client = Vec::new();

        let outcome = forwarder(64).relay(&mut origin, &mut client).await.unwrap();
        assert_eq!(client, response.as_bytes());
        assert_eq!(outcome.status, Some(200));
        assert!(outcome.object.is_none());
    }

    #[tokio::test]
    async fn error_status_is_not_cacheable() {
        let mut origin: &[u8] = b"HTTP/1.0 404 Not Found\r\n\r\nmissing";
        let mut client = Vec::new();

        let outcome = forwarder(1024).relay(&mut origin, &mut client).await.unwrap();
        assert_eq!(outcome.status, Some(404));
        assert!(outcome.object.is_some());
        assert!(outcome.into_cacheable().is_none());
    }

    #[tokio::test]
    async fn client_write_failure_aborts() {
        let mut origin: &[u8] = b"HTTP/1.0 200 OK\r\n\r\nbody";
        let err = forwarder(1024).relay(&mut origin, &mut BrokenClient).await.unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn unreachable_origin_is_connect_error() {
        // Grab a free port, then close it so nothing is listening.
        let port = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let request = crate::http::request::parse(&format!("GET http://127.0.0.1:{}/x.html HTTP/1.0", port)).unwrap();
        let mut client = Vec::new();

        let err = forwarder(1024).forward(&request, "", &mut client).await.unwrap_err();
        match err {
            ProxyError::Connect { host, .. } => assert_eq!(host, "127.0.0.1"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(client.is_empty());
    }
}
