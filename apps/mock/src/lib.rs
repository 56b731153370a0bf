//! Demo echo server and client for the Portico gateway.

pub mod cli;
pub mod client;
pub mod config;
pub mod handlers;
pub mod server;

use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber (`RUST_LOG` overrides `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
