//! Events: the unit of dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value_object::{EventId, RoomName, Timestamp, UserId};

/// Closed set of event kinds known to this core.
///
/// Wire names are snake_case. Anything unrecognised is kept verbatim in
/// `Unknown` so that newer clients can talk to older servers: such events are
/// accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    ConnectionStatus,
    Heartbeat,
    Pong,
    JoinRoom,
    LeaveRoom,
    RoomJoined,
    RoomLeft,
    RoomMessage,
    AdminBroadcast,
    RoleBroadcast,
    PaymentReceived,
    ProjectUpdate,
    TicketUpdate,
    InvoiceUpdate,
    Notification,
    Unknown(String),
}

impl EventKind {
    pub fn from_wire(value: &str) -> Self {
        match value {
            "connection_status" => EventKind::ConnectionStatus,
            "heartbeat" => EventKind::Heartbeat,
            "pong" => EventKind::Pong,
            "join_room" => EventKind::JoinRoom,
            "leave_room" => EventKind::LeaveRoom,
            "room_joined" => EventKind::RoomJoined,
            "room_left" => EventKind::RoomLeft,
            "room_message" => EventKind::RoomMessage,
            "admin_broadcast" => EventKind::AdminBroadcast,
            "role_broadcast" => EventKind::RoleBroadcast,
            "payment_received" => EventKind::PaymentReceived,
            "project_update" => EventKind::ProjectUpdate,
            "ticket_update" => EventKind::TicketUpdate,
            "invoice_update" => EventKind::InvoiceUpdate,
            "notification" => EventKind::Notification,
            other => EventKind::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ConnectionStatus => "connection_status",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Pong => "pong",
            EventKind::JoinRoom => "join_room",
            EventKind::LeaveRoom => "leave_room",
            EventKind::RoomJoined => "room_joined",
            EventKind::RoomLeft => "room_left",
            EventKind::RoomMessage => "room_message",
            EventKind::AdminBroadcast => "admin_broadcast",
            EventKind::RoleBroadcast => "role_broadcast",
            EventKind::PaymentReceived => "payment_received",
            EventKind::ProjectUpdate => "project_update",
            EventKind::TicketUpdate => "ticket_update",
            EventKind::InvoiceUpdate => "invoice_update",
            EventKind::Notification => "notification",
            EventKind::Unknown(raw) => raw,
        }
    }

    /// Kinds that only admins or internal collaborators may dispatch.
    pub fn is_restricted(&self) -> bool {
        matches!(
            self,
            EventKind::AdminBroadcast
                | EventKind::RoleBroadcast
                | EventKind::PaymentReceived
                | EventKind::ProjectUpdate
                | EventKind::TicketUpdate
                | EventKind::InvoiceUpdate
                | EventKind::Notification
        )
    }

    /// Inbound kinds that only prove liveness.
    pub fn is_liveness(&self) -> bool {
        matches!(self, EventKind::Heartbeat | EventKind::Pong)
    }

    /// Domain notifications emitted by external collaborators.
    pub fn is_domain_notification(&self) -> bool {
        matches!(
            self,
            EventKind::PaymentReceived
                | EventKind::ProjectUpdate
                | EventKind::TicketUpdate
                | EventKind::InvoiceUpdate
                | EventKind::Notification
        )
    }
}

impl From<String> for EventKind {
    fn from(value: String) -> Self {
        EventKind::from_wire(&value)
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: Timestamp,
    pub user_id: Option<UserId>,
    pub room_id: Option<RoomName>,
}

impl Event {
    pub fn new(kind: EventKind, payload: Value, timestamp: Timestamp) -> Self {
        Self {
            id: EventId::generate(),
            kind,
            payload,
            timestamp,
            user_id: None,
            room_id: None,
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_room(mut self, room_id: RoomName) -> Self {
        self.room_id = Some(room_id);
        self
    }
}
