//! Utilities shared by the Switchboard server and client.

pub mod logger;
pub mod time;
