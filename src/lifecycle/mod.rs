//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Metrics → Cache + Listener → Accept loop
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Stop accepting → Wait (bounded) for workers → Exit
//!
//! Signals (signals.rs):
//!     SIGINT → Trigger shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
