//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, fatal on bind/accept failure)
//!     → connection.rs (connection ID, active count, state names)
//!     → Hand off to the HTTP layer on a fresh task
//!
//! Connection States:
//!     Accepted → Parsed → HitServed | MissForwarded | Rejected → Closed
//! ```
//!
//! # Design Decisions
//! - No accept backpressure; every connection gets its own task
//! - Each connection tracked so shutdown can wait for in-flight work

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{Listener, ListenerError};
