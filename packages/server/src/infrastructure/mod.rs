//! Infrastructure layer: registry, tokens, transports, dispatch and DTOs.

pub mod dispatcher;
pub mod dto;
pub mod heartbeat;
pub mod registry;
pub mod token;
pub mod transport;
