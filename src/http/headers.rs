//! Client header collection and the outbound header block.
//!
//! # Responsibilities
//! - Read client header lines up to the blank line
//! - Strip hop-by-hop headers (`Connection`, `Proxy-Connection`)
//! - Append the fixed proxy header set in a fixed order
//!
//! # Design Decisions
//! - Header names compare ASCII case-insensitively
//! - Every other client header is forwarded verbatim and in order
//! - A client `Host` header supplies the value of the appended `Host:` line
//!   instead of being forwarded in place, so the origin sees exactly one

use tokio::io::AsyncBufRead;

use crate::config::LimitsConfig;
use crate::http::error::ProxyError;
use crate::http::request::{read_capped_line, trim_line_ending, ParseError, Request};

pub const USER_AGENT: &str =
    "User-Agent: Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";
pub const ACCEPT: &str = "Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding: gzip, deflate";
pub const CONNECTION_CLOSE: &str = "Connection: close";
pub const PROXY_CONNECTION_CLOSE: &str = "Proxy-Connection: close";

const HOP_BY_HOP: &[&str] = &["connection", "proxy-connection"];

/// The name part of a `Name: value` line, trimmed.
fn header_name(line: &str) -> Option<&str> {
    line.split_once(':').map(|(name, _)| name.trim())
}

fn header_value(line: &str) -> &str {
    line.split_once(':').map(|(_, value)| value.trim()).unwrap_or("")
}

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| name.eq_ignore_ascii_case(h))
}

/// Read client header lines until a blank line or end of stream.
///
/// Lines are returned without their line endings.
pub async fn read_client_headers<R>(reader: &mut R, limits: &LimitsConfig) -> Result<Vec<String>, ProxyError>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();

    while let Some(raw) = read_capped_line(reader, limits.max_line_bytes).await? {
        if !raw.ends_with(b"\n") && raw.len() >= limits.max_line_bytes {
            return Err(ParseError::Malformed(format!(
                "header line exceeds {} bytes",
                limits.max_line_bytes
            ))
            .into());
        }

        let line = trim_line_ending(&raw);
        if line.is_empty() {
            break;
        }
        if headers.len() == limits.max_header_lines {
            return Err(ParseError::Malformed(format!(
                "more than {} header lines",
                limits.max_header_lines
            ))
            .into());
        }
        headers.push(String::from_utf8_lossy(line).into_owned());
    }

    Ok(headers)
}

/// Build the header block sent to the origin, ending with the blank line.
pub fn rewrite_headers(client_headers: &[String], request: &Request) -> String {
    let mut block = String::new();
    let mut host = request.host.as_str();

    for line in client_headers {
        match header_name(line) {
            Some(name) if is_hop_by_hop(name) => continue,
            Some(name) if name.eq_ignore_ascii_case("host") => {
                let value = header_value(line);
                if !value.is_empty() {
                    host = value;
                }
                continue;
            }
            _ => {}
        }
        block.push_str(line);
        block.push_str("\r\n");
    }

    let host_line = format!("Host: {}", host);
    for line in [
        host_line.as_str(),
        USER_AGENT,
        ACCEPT,
        ACCEPT_ENCODING,
        CONNECTION_CLOSE,
        PROXY_CONNECTION_CLOSE,
    ] {
        block.push_str(line);
        block.push_str("\r\n");
    }
    block.push_str("\r\n");
    block
}

/// The full request sent upstream: request line plus rewritten headers.
pub fn request_head(request: &Request, client_headers: &[String]) -> String {
    format!(
        "GET {} HTTP/1.0\r\n{}",
        request.path,
        rewrite_headers(client_headers, request)
    )
}
