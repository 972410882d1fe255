//! respkv Server Binary
//!
//! Starts the TCP server for respkv.

use clap::Parser;
use respkv::{Config, Server};
use tracing_subscriber::{fmt, EnvFilter};

/// respkv Server
#[derive(Parser, Debug)]
#[command(name = "respkv-server")]
#[command(about = "In-memory key-value server with a single dispatcher")]
#[command(version)]
struct Args {
    /// Listen address (host:port, ":port", or empty for the default)
    #[arg(short, long, default_value = respkv::config::DEFAULT_LISTEN_ADDR)]
    listen: String,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,

    /// Peer read timeout in milliseconds (0 disables)
    #[arg(short, long, default_value = "0")]
    read_timeout_ms: u64,

    /// Message channel capacity (0 = rendezvous)
    #[arg(short, long, default_value = "0")]
    queue_capacity: usize,

    /// Maximum number of keys (0 = unlimited)
    #[arg(short = 'e', long, default_value = "0")]
    max_entries: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,respkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("respkv Server v{}", respkv::VERSION);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let config = Config::builder()
        .listen_addr(&args.listen)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .message_queue_capacity(args.queue_capacity)
        .max_entries(args.max_entries)
        .build();

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    match server.run() {
        Ok(store) => tracing::info!("Server stopped with {} keys", store.len()),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    }
}
