//! Caching HTTP/1.0 forward proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌───────────────────────────────────────────────┐
//!                         │                 CACHING PROXY                 │
//!                         │                                               │
//!   GET http://h/p        │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!  ───────────────────────┼─▶│   net    │──▶│  worker  │──▶│  request  │  │
//!                         │  │ listener │   │ (1/conn) │   │  parser   │  │
//!                         │  └──────────┘   └────┬─────┘   └───────────┘  │
//!                         │                      │                        │
//!                         │            lookup    ▼    insert              │
//!                         │               ┌─────────────┐                 │
//!                         │               │ object cache│ (LRU, rwlock)   │
//!                         │               └─────────────┘                 │
//!                         │                      │ miss                   │
//!                         │                      ▼                        │
//!   response              │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!  ◀──────────────────────┼──│  client  │◀──│ forwarder│──▶│  header   │──┼──▶ origin
//!                         │  │  stream  │   │          │   │ rewriter  │  │
//!                         │  └──────────┘   └──────────┘   └───────────┘  │
//!                         └───────────────────────────────────────────────┘
//! ```

use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;

use caching_proxy::config::{load_config, ProxyConfig};
use caching_proxy::lifecycle::startup;
use caching_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "caching-proxy")]
#[command(version, about = "Concurrent caching proxy for HTTP/1.0 GET requests", long_about = None)]
struct Cli {
    /// Port to listen on
    port: u16,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            // Usage errors exit with 1, not clap's default of 2.
            let _ = e.print();
            std::process::exit(1);
        }
    };

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    config.listener.port = cli.port;

    logging::init_logging(&config.observability);
    tracing::info!("caching-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
