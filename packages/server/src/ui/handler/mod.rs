//! HTTP and SSE handlers.

mod error;
mod http;
mod identity;
mod stream;

pub use http::{
    admin_broadcast, admin_notify, disconnect_connection, get_stats, health_check, issue_token,
    list_connections, list_rooms, send_event,
};
pub use stream::stream_handler;
