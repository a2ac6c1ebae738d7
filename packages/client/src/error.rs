//! Error types for the Switchboard client.

use thiserror::Error;

/// Failures talking to the realtime server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Identity rejected by the server (401); retrying cannot help
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Network failure, closed stream or server error
    #[error("Connection error: {0}")]
    Connection(String),

    /// A single request was refused (bad request, forbidden, too large)
    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },
}

/// Errors surfaced by the session state machine to its owner
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Gave up after the configured number of consecutive failures
    #[error("Failed to reconnect after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    /// The server refused the session itself
    #[error("Session rejected: {0}")]
    Rejected(String),

    /// `send` while visible but without an open stream
    #[error("Not connected")]
    NotConnected,
}
