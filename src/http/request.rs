//! Request line parsing.
//!
//! # Responsibilities
//! - Read the request line from the client with a length cap
//! - Split it into method, target and version
//! - Derive host, port and a normalized path from an absolute `http://` URI
//!
//! # Design Decisions
//! - Only `GET` is accepted
//! - A second `:` in the authority is rejected rather than guessed at
//! - Paths without a recognized file extension are treated as directories
//!   and get a trailing `/`, so `/dir` and `/dir/` share a cache entry

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::cache::CacheKey;
use crate::config::LimitsConfig;
use crate::http::error::ProxyError;

const SCHEME: &str = "http://";
const DEFAULT_PORT: &str = "80";

/// Path endings that mark a file rather than a directory.
///
/// Fixed for compatibility with existing cache keys; do not extend casually.
const FILE_SUFFIXES: &[&str] = &[
    ".html", ".css", ".xml", ".gif", ".png", ".jpg", ".c", ".js", ".json", ".ini", ".csv",
    ".tsv", ".bak", ".bk", ".bin", ".dat", ".dsk", ".raw", ".asc", ".txt", ".ttf", ".woff",
];

/// Extensionless names that are files when they are the whole last segment.
const FILE_NAMES: &[&str] = &["tiny"];

/// What was wrong with the request URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriIssue {
    MissingScheme,
    AmbiguousPort,
    EmptyHost,
    EmptyPort,
}

impl std::fmt::Display for UriIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            UriIssue::MissingScheme => "missing http:// scheme",
            UriIssue::AmbiguousPort => "more than one ':' in authority",
            UriIssue::EmptyHost => "empty host",
            UriIssue::EmptyPort => "empty port",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("malformed request: {0:?}")]
    Malformed(String),

    #[error("unsupported method {0:?}")]
    BadMethod(String),

    #[error("bad URI {uri:?}: {reason}")]
    BadUri { uri: String, reason: UriIssue },
}

impl ParseError {
    /// The offending value, as cited in the error document.
    pub fn cause(&self) -> &str {
        match self {
            ParseError::Malformed(line) => line,
            ParseError::BadMethod(method) => method,
            ParseError::BadUri { uri, .. } => uri,
        }
    }
}

/// A parsed client request. The method is always `GET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub version: String,
    pub host: String,
    /// Decimal port, `"80"` when the URI has none.
    pub port: String,
    /// Normalized path, always starting with `/`.
    pub path: String,
}

impl Request {
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.host.clone(), self.path.clone())
    }

    /// `host:port`, as handed to the resolver.
    pub fn origin_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a request line such as `GET http://example.com:8080/a.html HTTP/1.0`.
pub fn parse(line: &str) -> Result<Request, ParseError> {
    let mut tokens = line.split_whitespace();
    let (Some(method), Some(target), Some(version)) = (tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::Malformed(line.trim().to_string()));
    };

    if method != "GET" {
        return Err(ParseError::BadMethod(method.to_string()));
    }

    let bad_uri = |reason| ParseError::BadUri {
        uri: target.to_string(),
        reason,
    };

    let rest = target
        .strip_prefix(SCHEME)
        .ok_or_else(|| bad_uri(UriIssue::MissingScheme))?;

    let (authority, raw_path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };

    let (host, port) = match authority.matches(':').count() {
        0 => (authority, DEFAULT_PORT),
        1 => authority.split_once(':').unwrap_or((authority, DEFAULT_PORT)),
        _ => return Err(bad_uri(UriIssue::AmbiguousPort)),
    };
    if host.is_empty() {
        return Err(bad_uri(UriIssue::EmptyHost));
    }
    if port.is_empty() {
        return Err(bad_uri(UriIssue::EmptyPort));
    }

    Ok(Request {
        method: method.to_string(),
        target: target.to_string(),
        version: version.to_string(),
        host: host.to_string(),
        port: port.to_string(),
        path: normalize_path(raw_path),
    })
}

/// Collapse empty segments and apply the directory heuristic.
fn normalize_path(raw: &str) -> String {
    let mut path = String::with_capacity(raw.len() + 1);
    for segment in raw.split('/').filter(|s| !s.is_empty()) {
        path.push('/');
        path.push_str(segment);
    }

    if path.is_empty() {
        return "/".to_string();
    }
    if is_directory(&path) {
        path.push('/');
    }
    path
}

fn is_directory(path: &str) -> bool {
    if path.ends_with('/') {
        return false;
    }
    let last = path.rsplit('/').next().unwrap_or(path);
    !FILE_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) && !FILE_NAMES.contains(&last)
}

/// Read one `\n`-terminated line of at most `limit` bytes.
///
/// Returns `None` at end of stream. A returned line without a trailing
/// `\n` either hit the limit or was cut off by EOF.
pub(crate) async fn read_capped_line<R>(reader: &mut R, limit: usize) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = reader.take(limit as u64).read_until(b'\n', &mut line).await?;
    if n == 0 {
        Ok(None)
    } else {
        Ok(Some(line))
    }
}

/// Strip a trailing `\n` or `\r\n`.
pub(crate) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Read and parse the client's request line.
pub async fn read_request<R>(reader: &mut R, limits: &LimitsConfig) -> Result<Request, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let Some(raw) = read_capped_line(reader, limits.max_line_bytes).await? else {
        return Err(ParseError::Malformed(String::new()).into());
    };
    if !raw.ends_with(b"\n") && raw.len() >= limits.max_line_bytes {
        return Err(ParseError::Malformed(format!(
            "request line exceeds {} bytes",
            limits.max_line_bytes
        ))
        .into());
    }

    let line = String::from_utf8_lossy(trim_line_ending(&raw));
    tracing::debug!(request_line = %line, "Request line received");
    Ok(parse(&line)?)
}
