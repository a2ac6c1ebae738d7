//! Domain error types.

use thiserror::Error;

use super::value_object::{ConnectionId, RoomName};

/// Validation failure of a value object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("{field} contains invalid character {ch:?}")]
    InvalidCharacter { field: &'static str, ch: char },

    #[error("unknown role '{0}'")]
    UnknownRole(String),
}

/// Errors raised by the connection registry and its room index.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The id is live or was retired; a replayed stream token lands here.
    #[error("connection '{0}' is already registered or was retired")]
    AlreadyRegistered(ConnectionId),

    #[error("connection '{0}' not found")]
    NotFound(ConnectionId),

    #[error("connection '{connection_id}' cannot join more than {max} rooms (rejected '{room}')")]
    RoomLimitExceeded {
        connection_id: ConnectionId,
        room: RoomName,
        max: usize,
    },
}

/// Stream token verification failures (authentication failures).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("stream token is malformed or its signature is invalid: {0}")]
    Invalid(String),

    #[error("stream token has expired")]
    Expired,

    #[error("token type '{0}' is not a stream token")]
    WrongType(String),

    #[error("stream token carries an invalid claim: {0}")]
    InvalidClaim(String),

    #[error("failed to sign stream token: {0}")]
    Signing(String),
}

/// Failure to hand a frame to one connection's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,

    #[error("transport buffer is full")]
    Full,
}

/// Dispatch refusals. Transport failures never surface here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("sender is not allowed to dispatch '{kind}' events")]
    Unauthorized { kind: String },

    #[error("failed to serialize event: {0}")]
    Serialization(String),
}

/// Rejections produced while sanitizing an inbound payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SanitizeError {
    #[error("payload nesting exceeds {max} levels")]
    TooDeep { max: usize },
}
