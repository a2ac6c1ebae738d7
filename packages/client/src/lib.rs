//! Reconnecting SSE client for the Switchboard realtime server.
//!
//! - `session`: transport-free state machine (`ClientSession`)
//! - `driver`: executes session commands against a `PortalApi`
//! - `api`: HTTP / SSE adapter
//! - `runner`: interactive terminal client

pub mod api;
pub mod domain;
pub mod driver;
pub mod error;
pub mod runner;
pub mod session;

mod formatter;
mod ui;

pub use runner::{ClientConfig, run_client};
