//! Realtime push server with rooms, role broadcast and heartbeats.
//!
//! Run with:
//! ```not_rust
//! SWITCHBOARD_TOKEN_SECRET=change-me cargo run --bin switchboard-server
//! cargo run --bin switchboard-server -- --host 0.0.0.0 --port 3000 --token-secret change-me
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use switchboard_server::{config::RealtimeConfig, ui::Server};
use switchboard_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "switchboard-server")]
#[command(about = "Realtime SSE server with rooms, role broadcast and heartbeats", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// HS256 secret used to sign stream tokens
    #[arg(long, env = "SWITCHBOARD_TOKEN_SECRET", hide_env_values = true)]
    token_secret: String,

    /// Lifetime of a stream token in seconds
    #[arg(long, default_value = "300")]
    token_ttl_secs: i64,

    /// Interval between heartbeat rounds in seconds
    #[arg(long, default_value = "30")]
    heartbeat_interval_secs: u64,

    /// Largest accepted client event body in bytes
    #[arg(long, default_value = "65536")]
    max_event_bytes: usize,

    /// Frames buffered per connection before pushes fail
    #[arg(long, default_value = "256")]
    outbound_buffer: usize,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl From<&Args> for RealtimeConfig {
    fn from(args: &Args) -> Self {
        Self {
            token_secret: args.token_secret.clone(),
            token_ttl_secs: args.token_ttl_secs,
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
            max_event_bytes: args.max_event_bytes,
            outbound_buffer: args.outbound_buffer,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    if args.token_secret.is_empty() {
        tracing::error!("--token-secret must not be empty");
        std::process::exit(1);
    }

    let server = Server::from_config(RealtimeConfig::from(&args), Arc::new(SystemClock));
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
