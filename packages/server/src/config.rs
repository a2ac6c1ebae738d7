//! Runtime configuration of the realtime core.

use std::time::Duration;

use crate::infrastructure::{heartbeat::DEFAULT_HEARTBEAT_INTERVAL, token::DEFAULT_TOKEN_TTL_SECS};

/// Largest accepted client-originated event body (64 KiB).
pub const DEFAULT_MAX_EVENT_BYTES: usize = 64 * 1024;

/// Frames buffered per connection before pushes start failing.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// HS256 secret for stream tokens.
    pub token_secret: String,
    pub token_ttl_secs: i64,
    pub heartbeat_interval: Duration,
    pub max_event_bytes: usize,
    pub outbound_buffer: usize,
}

impl RealtimeConfig {
    pub fn new(token_secret: impl Into<String>) -> Self {
        Self {
            token_secret: token_secret.into(),
            ..Self::default()
        }
    }

    /// Retired connection ids are remembered for as long as a token naming
    /// them could still be presented.
    pub fn retired_retention_millis(&self) -> i64 {
        self.token_ttl_secs.saturating_mul(1000)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            token_secret: String::new(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            max_event_bytes: DEFAULT_MAX_EVENT_BYTES,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
        }
    }
}
