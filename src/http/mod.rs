//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (spawn a worker task)
//!     → worker.rs (per-connection state machine)
//!         → request.rs (request line → Request)
//!         → headers.rs (client headers → outbound header block)
//!         → cache lookup
//!             hit  → cached bytes to client
//!             miss → forward.rs (origin exchange, stream + accumulate)
//!                  → cache insert if 200 and small enough
//!         → response.rs (error documents on failure)
//!     → close
//! ```

pub mod error;
pub mod forward;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;
pub mod worker;

pub use error::ProxyError;
pub use forward::{ForwardOutcome, Forwarder};
pub use request::{parse, ParseError, Request, UriIssue};
pub use response::{ErrorPage, ErrorStatus};
pub use server::HttpServer;
pub use worker::{handle_connection, ProxyContext};
