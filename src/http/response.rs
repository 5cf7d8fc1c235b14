//! Error documents sent to clients.
//!
//! # Responsibilities
//! - Map request and origin failures to an HTTP status
//! - Render a minimal HTML page citing the offending value
//!
//! # Design Decisions
//! - Parse and connect failures are 400 by default
//! - Legacy mode answers unsupported methods with 501 and empty host/port
//!   fields with 404
//! - Transport failures get no document; the response may be half sent

use crate::http::error::ProxyError;
use crate::http::request::{ParseError, UriIssue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    BadRequest,
    NotFound,
    NotImplemented,
}

impl ErrorStatus {
    pub fn code(&self) -> u16 {
        match self {
            ErrorStatus::BadRequest => 400,
            ErrorStatus::NotFound => 404,
            ErrorStatus::NotImplemented => 501,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ErrorStatus::BadRequest => "Bad Request",
            ErrorStatus::NotFound => "Not Found",
            ErrorStatus::NotImplemented => "Not Implemented",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub status: ErrorStatus,
    pub cause: String,
}

impl ErrorPage {
    pub fn new(status: ErrorStatus, cause: impl Into<String>) -> Self {
        Self {
            status,
            cause: cause.into(),
        }
    }

    /// The page for an error, or `None` when no page should be sent.
    pub fn for_error(err: &ProxyError, legacy_status_codes: bool) -> Option<Self> {
        match err {
            ProxyError::Parse(parse) => {
                let status = match parse {
                    ParseError::BadMethod(_) if legacy_status_codes => ErrorStatus::NotImplemented,
                    ParseError::BadUri {
                        reason: UriIssue::EmptyHost | UriIssue::EmptyPort,
                        ..
                    } if legacy_status_codes => ErrorStatus::NotFound,
                    _ => ErrorStatus::BadRequest,
                };
                Some(Self::new(status, parse.cause()))
            }
            ProxyError::Connect { host, .. } => Some(Self::new(ErrorStatus::BadRequest, host.as_str())),
            ProxyError::Transport(_) => None,
        }
    }

    /// Full HTTP/1.0 response: status line, headers and HTML body.
    pub fn render(&self) -> String {
        let title = format!("Error {}: {}", self.status.code(), self.status.reason());
        let body = format!(
            "<html><head><title>{title}</title></head>\r\n\
             <body><h1>{title}</h1>\r\n\
             <p>Caused by <em>{}</em></p></body></html>\r\n",
            escape_html(&self.cause)
        );
        format!(
            "HTTP/1.0 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status.code(),
            self.status.reason(),
            body.len(),
            body
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
