//! HTTP / SSE surface of the realtime server.

mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
