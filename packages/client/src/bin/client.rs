//! Interactive SSE client with rooms, hidden-state queueing and reconnection.
//!
//! Connects to a Switchboard server, joins an optional room and sends each
//! typed line as a room message. Reconnects on disconnection with a fixed
//! interval (max 5 attempts with 5 second interval by default).
//!
//! Run with:
//! ```not_rust
//! cargo run --bin switchboard-client -- --user-id alice --room project-42
//! cargo run --bin switchboard-client -- -u bob -r admin --url http://127.0.0.1:8080
//! ```

use std::time::Duration;

use clap::Parser;
use switchboard_client::{
    ClientConfig, run_client,
    session::{
        DEFAULT_DEDUP_WINDOW, DEFAULT_HIDDEN_QUEUE_CAPACITY, SessionConfig,
    },
};
use switchboard_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "switchboard-client")]
#[command(about = "Reconnecting SSE client for the Switchboard realtime server", long_about = None)]
struct Args {
    /// User ID presented to the server (x-user-id)
    #[arg(short = 'u', long)]
    user_id: String,

    /// Role presented to the server (x-user-role)
    #[arg(short = 'r', long, default_value = "client", value_parser = ["admin", "client"])]
    role: String,

    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Room to join after every (re)connect
    #[arg(long)]
    room: Option<String>,

    /// Consecutive failed attempts before giving up
    #[arg(long, default_value = "5")]
    max_reconnect_attempts: u32,

    /// Seconds between reconnect attempts
    #[arg(long, default_value = "5")]
    reconnect_interval_secs: u64,

    /// Seconds between client heartbeats
    #[arg(long, default_value = "25")]
    heartbeat_interval_secs: u64,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            url: args.url,
            user_id: args.user_id,
            role: args.role,
            room: args.room,
            session: SessionConfig {
                max_reconnect_attempts: args.max_reconnect_attempts,
                reconnect_interval: Duration::from_secs(args.reconnect_interval_secs),
                heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
                hidden_queue_capacity: DEFAULT_HIDDEN_QUEUE_CAPACITY,
                dedup_window: DEFAULT_DEDUP_WINDOW,
            },
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Run the client
    if let Err(e) = run_client(ClientConfig::from(args)).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
