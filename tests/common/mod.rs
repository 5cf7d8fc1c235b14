//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use caching_proxy::config::ProxyConfig;
use caching_proxy::net::{ConnectionTracker, Listener};
use caching_proxy::{CacheKey, HttpServer, ObjectCache, Shutdown};

/// A mock origin server that counts connections and records request heads.
#[allow(dead_code)]
pub struct Origin {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl Origin {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        _ => "200 OK",
    }
}

/// Start an origin whose response is computed from the request path.
pub async fn start_programmable_origin<F>(f: F) -> Origin
where
    F: Fn(&str) -> (u16, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));
    let f = Arc::new(f);

    let origin = Origin {
        addr,
        hits: hits.clone(),
        requests: requests.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else { break };
            hits.fetch_add(1, Ordering::SeqCst);
            let f = f.clone();
            let requests = requests.clone();

            tokio::spawn(async move {
                let (read_half, mut write_half) = socket.into_split();
                let head = read_head(&mut BufReader::new(read_half)).await;

                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                requests.lock().unwrap().push(head);

                let (status, body) = f(&path);
                let response = format!(
                    "HTTP/1.0 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text(status),
                    body.len(),
                    body
                );
                let _ = write_half.write_all(response.as_bytes()).await;
                let _ = write_half.shutdown().await;
            });
        }
    });

    origin
}

/// Read a request head up to and including the blank line.
pub async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> String {
    let mut head = String::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                head.push_str(&line);
                if line == "\r\n" || line == "\n" {
                    break;
                }
            }
        }
    }
    head
}

/// Abort `socket` with a TCP reset instead of an orderly close.
#[allow(dead_code, deprecated)]
pub fn reset(socket: TcpStream) {
    let _ = socket.set_linger(Some(Duration::ZERO));
    drop(socket);
}

/// Start an origin that sends `partial` and then resets the connection.
#[allow(dead_code)]
pub async fn start_resetting_origin(partial: &'static [u8]) -> Origin {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let requests = Arc::new(Mutex::new(Vec::new()));

    let origin = Origin {
        addr,
        hits: hits.clone(),
        requests: requests.clone(),
    };

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { break };
            hits.fetch_add(1, Ordering::SeqCst);
            let requests = requests.clone();

            tokio::spawn(async move {
                let head = read_head(&mut BufReader::new(&mut socket)).await;
                requests.lock().unwrap().push(head);
                let _ = socket.write_all(partial).await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                reset(socket);
            });
        }
    });

    origin
}

/// Start an origin that always answers 200 with `body`.
#[allow(dead_code)]
pub async fn start_origin(body: &'static str) -> Origin {
    start_programmable_origin(move |_| (200, body.to_string())).await
}

/// A running proxy on an ephemeral port.
#[allow(dead_code)]
pub struct Proxy {
    pub addr: SocketAddr,
    pub cache: ObjectCache,
    pub tracker: ConnectionTracker,
    shutdown: Shutdown,
}

impl Drop for Proxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> Proxy {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp);

    let server = HttpServer::new(config);
    let cache = server.cache().clone();
    let tracker = server.tracker();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    Proxy {
        addr,
        cache,
        tracker,
        shutdown,
    }
}

/// Send raw request text through the proxy and read until it closes.
#[allow(dead_code)]
pub async fn send_raw(proxy: SocketAddr, request: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(10), stream.read_to_end(&mut response))
        .await
        .expect("proxy did not close the connection")
        .unwrap();
    response
}

/// `GET <url> HTTP/1.0` with a `Host` header and the given extra headers.
#[allow(dead_code)]
pub async fn proxy_get(proxy: SocketAddr, url: &str, extra_headers: &[&str]) -> Vec<u8> {
    let mut request = format!("GET {} HTTP/1.0\r\n", url);
    for header in extra_headers {
        request.push_str(header);
        request.push_str("\r\n");
    }
    request.push_str("\r\n");
    send_raw(proxy, &request).await
}

/// Poll until `key` is cached or two seconds pass.
#[allow(dead_code)]
pub async fn wait_for_cached(cache: &ObjectCache, key: &CacheKey) -> bool {
    for _ in 0..40 {
        if cache.contains(key).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
