//! Per-connection error taxonomy.
//!
//! Every variant is handled inside the worker that produced it; none of
//! them reach the listener or another connection.

use thiserror::Error;

use crate::http::request::ParseError;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The client's request could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The origin could not be reached. Never retried.
    #[error("cannot connect to {host}: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// A read or write failed mid-transfer, on either side.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl ProxyError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Parse(_) => "parse",
            ProxyError::Connect { .. } => "connect",
            ProxyError::Transport(_) => "transport",
        }
    }

    /// Peer went away: reset connections and broken pipes are routine.
    pub fn is_disconnect(&self) -> bool {
        use std::io::ErrorKind;
        match self {
            ProxyError::Transport(e) => matches!(
                e.kind(),
                ErrorKind::BrokenPipe
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn kinds_and_disconnects() {
        let reset = ProxyError::Transport(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(reset.kind(), "transport");
        assert!(reset.is_disconnect());

        let other = ProxyError::Transport(io::Error::other("boom"));
        assert!(!other.is_disconnect());

        let connect = ProxyError::Connect {
            host: "origin.test".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(connect.kind(), "connect");
        assert!(connect.to_string().contains("origin.test"));
    }
}
