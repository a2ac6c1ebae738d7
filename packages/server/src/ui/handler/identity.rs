//! Caller identity asserted by the upstream authentication layer.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::domain::{Identity, Role, UserId};

use super::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extracts the trusted `x-user-id` / `x-user-role` headers; 401 when absent.
pub struct CallerIdentity(pub Identity);

impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = header_value(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing x-user-id header"))?;
        let role = header_value(parts, USER_ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing x-user-role header"))?;

        let user_id = UserId::try_from(user_id).map_err(|e| ApiError::unauthorized(e.to_string()))?;
        let role = role
            .parse::<Role>()
            .map_err(|e| ApiError::unauthorized(e.to_string()))?;

        Ok(CallerIdentity(Identity::new(user_id, role)))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
