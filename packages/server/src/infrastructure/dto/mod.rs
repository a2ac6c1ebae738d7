//! Data Transfer Objects (DTOs) for the realtime API.
//!
//! DTOs are organized by protocol:
//! - `event`: the JSON envelope carried in every SSE `data` field
//! - `http`: HTTP API request / response DTOs

pub mod conversion;
pub mod event;
pub mod http;
