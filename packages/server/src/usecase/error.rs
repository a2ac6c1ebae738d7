//! UseCase layer errors.
//!
//! HTTP ステータスへの変換は UI 層（`ui/handler/error.rs`）でのみ行います。

use thiserror::Error;

use crate::domain::{
    ConnectionId, DispatchError, RegistryError, SanitizeError, TokenError, ValueObjectError,
};

#[derive(Debug, Error)]
pub enum IssueTokenError {
    #[error(transparent)]
    Token(#[from] TokenError),
}

#[derive(Debug, Error)]
pub enum OpenStreamError {
    /// Bad signature, wrong purpose or expired.
    #[error("invalid stream token: {0}")]
    InvalidToken(#[from] TokenError),

    /// The connection id is live or retired: the token was already used.
    #[error("stream token for connection '{0}' was already used")]
    Replayed(ConnectionId),

    #[error(transparent)]
    Registry(RegistryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<RegistryError> for OpenStreamError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyRegistered(id) => OpenStreamError::Replayed(id),
            other => OpenStreamError::Registry(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum SendEventError {
    #[error("event body of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("malformed event: {0}")]
    Malformed(String),

    #[error("connection '{0}' not found")]
    ConnectionNotFound(ConnectionId),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("'{0}' events require a roomId")]
    MissingRoom(String),

    #[error("invalid room: {0}")]
    InvalidRoom(#[from] ValueObjectError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<SanitizeError> for SendEventError {
    fn from(e: SanitizeError) -> Self {
        SendEventError::Malformed(e.to_string())
    }
}

/// Errors shared by the admin-only use cases.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin role required")]
    Forbidden,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<ValueObjectError> for AdminError {
    fn from(e: ValueObjectError) -> Self {
        AdminError::BadRequest(e.to_string())
    }
}

impl From<SanitizeError> for AdminError {
    fn from(e: SanitizeError) -> Self {
        AdminError::BadRequest(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("'{0}' is not a domain notification")]
    NotNotification(String),

    #[error("malformed notification: {0}")]
    Malformed(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<ValueObjectError> for NotifyError {
    fn from(e: ValueObjectError) -> Self {
        NotifyError::Malformed(e.to_string())
    }
}

impl From<SanitizeError> for NotifyError {
    fn from(e: SanitizeError) -> Self {
        NotifyError::Malformed(e.to_string())
    }
}
