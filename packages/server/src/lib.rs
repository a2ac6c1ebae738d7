//! Switchboard realtime server.
//!
//! Connection registry, rooms, stream tokens, heartbeat and broadcast
//! dispatch, exposed over HTTP with a Server-Sent Events push stream.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
