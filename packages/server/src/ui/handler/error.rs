//! Mapping of use case errors to HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    domain::{DispatchError, RegistryError},
    infrastructure::dto::http::ErrorResponse,
    usecase::{AdminError, IssueTokenError, NotifyError, OpenStreamError, SendEventError},
};

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, "{}", self.message);
        } else {
            tracing::debug!(status = %self.status, "{}", self.message);
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn dispatch_status(e: &DispatchError) -> StatusCode {
    match e {
        DispatchError::Unauthorized { .. } => StatusCode::FORBIDDEN,
        DispatchError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn registry_status(e: &RegistryError) -> StatusCode {
    match e {
        RegistryError::AlreadyRegistered(_) | RegistryError::RoomLimitExceeded { .. } => {
            StatusCode::CONFLICT
        }
        RegistryError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

impl From<IssueTokenError> for ApiError {
    fn from(e: IssueTokenError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl From<OpenStreamError> for ApiError {
    fn from(e: OpenStreamError) -> Self {
        let status = match &e {
            OpenStreamError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            OpenStreamError::Replayed(_) => StatusCode::CONFLICT,
            OpenStreamError::Registry(e) => registry_status(e),
            OpenStreamError::Dispatch(e) => dispatch_status(e),
        };
        Self::new(status, e.to_string())
    }
}

impl From<SendEventError> for ApiError {
    fn from(e: SendEventError) -> Self {
        let status = match &e {
            SendEventError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            SendEventError::Malformed(_)
            | SendEventError::MissingRoom(_)
            | SendEventError::InvalidRoom(_) => StatusCode::BAD_REQUEST,
            SendEventError::ConnectionNotFound(_) => StatusCode::NOT_FOUND,
            SendEventError::Forbidden(_) => StatusCode::FORBIDDEN,
            SendEventError::Registry(e) => registry_status(e),
            SendEventError::Dispatch(e) => dispatch_status(e),
        };
        Self::new(status, e.to_string())
    }
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        let status = match &e {
            AdminError::Forbidden => StatusCode::FORBIDDEN,
            AdminError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AdminError::Dispatch(e) => dispatch_status(e),
        };
        Self::new(status, e.to_string())
    }
}

impl From<NotifyError> for ApiError {
    fn from(e: NotifyError) -> Self {
        let status = match &e {
            NotifyError::NotNotification(_) | NotifyError::Malformed(_) => StatusCode::BAD_REQUEST,
            NotifyError::Dispatch(e) => dispatch_status(e),
        };
        Self::new(status, e.to_string())
    }
}
