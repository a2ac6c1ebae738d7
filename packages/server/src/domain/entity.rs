//! Domain entities held by the connection registry.

use std::{collections::BTreeSet, fmt, net::IpAddr, sync::Arc};

use super::{
    transport::ConnectionTransport,
    value_object::{ConnectionId, Role, RoomName, Timestamp, UserId},
};

/// One live stream, as stored in the registry.
///
/// Identity (`user_id`, `role`) is fixed at construction. Everything else is
/// mutated only through the registry while it holds this entry's lock.
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub role: Role,
    pub rooms: BTreeSet<RoomName>,
    pub connected_at: Timestamp,
    pub last_activity: Timestamp,
    pub is_alive: bool,
    /// Set after a transport failure; the next heartbeat sweep reclaims it.
    pub pending_reclaim: bool,
    /// Audit only, never used for authorization.
    pub ip_address: Option<IpAddr>,
    transport: Arc<dyn ConnectionTransport>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        user_id: UserId,
        role: Role,
        ip_address: Option<IpAddr>,
        transport: Arc<dyn ConnectionTransport>,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            role,
            rooms: BTreeSet::new(),
            connected_at: now,
            last_activity: now,
            is_alive: true,
            pending_reclaim: false,
            ip_address,
            transport,
        }
    }

    pub fn transport(&self) -> Arc<dyn ConnectionTransport> {
        Arc::clone(&self.transport)
    }

    /// Record inbound activity (any message, including heartbeat responses).
    pub fn touch(&mut self, now: Timestamp) {
        self.last_activity = now;
        self.is_alive = true;
    }

    /// A connection is stale once it missed a heartbeat deadline or its
    /// transport failed.
    pub fn is_stale(&self) -> bool {
        !self.is_alive || self.pending_reclaim
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            role: self.role,
            rooms: self.rooms.iter().cloned().collect(),
            connected_at: self.connected_at,
            last_activity: self.last_activity,
            is_alive: self.is_alive,
            ip_address: self.ip_address,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("role", &self.role)
            .field("rooms", &self.rooms)
            .field("is_alive", &self.is_alive)
            .field("pending_reclaim", &self.pending_reclaim)
            .finish_non_exhaustive()
    }
}

/// Read-only copy of a connection handed out of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub role: Role,
    pub rooms: Vec<RoomName>,
    pub connected_at: Timestamp,
    pub last_activity: Timestamp,
    pub is_alive: bool,
    pub ip_address: Option<IpAddr>,
}

/// Filter for administrative enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionFilter {
    pub role: Option<Role>,
}

impl ConnectionFilter {
    pub fn role(role: Role) -> Self {
        Self { role: Some(role) }
    }

    pub fn matches(&self, connection: &Connection) -> bool {
        self.role.is_none_or(|role| role == connection.role)
    }
}

/// Room name with its current member count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: RoomName,
    pub member_count: usize,
}
