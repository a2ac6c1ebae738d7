//! `ConnectionTransport` implementations.

#[cfg(test)]
pub(crate) mod recording;
mod sse;

pub use sse::{SseReceiver, SseTransport, channel};
