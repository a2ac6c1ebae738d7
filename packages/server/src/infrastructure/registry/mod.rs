//! In-memory connection registry
//!
//! 全ての接続状態の唯一の情報源。ルームのメンバーシップ索引も同じ構造体が
//! 保持し、接続の削除とルームからの離脱を 1 回の呼び出しで行います。
//!
//! ## ロック規律
//!
//! - `connections` と `rooms` は `DashMap`（シャード単位のロック）
//! - 異なる接続 ID への操作は互いにブロックしない
//! - 同じ接続 ID への操作はそのエントリのロックで直列化される
//! - ネストする場合の順序は常に `connections` → `rooms` / `retired`
//! - ロック保持中に I/O や `.await` を行わない（transport の close はロック解放後）

mod rooms;

use std::{net::IpAddr, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use switchboard_shared::time::Clock;

use crate::domain::{
    Connection, ConnectionFilter, ConnectionId, ConnectionSnapshot, ConnectionTransport,
    RegistryError, Role, RoomName, Timestamp, UserId,
};

pub use rooms::MAX_ROOMS_PER_CONNECTION;

/// Resolved dispatch target: an id and the transport to push to.
pub type Target = (ConnectionId, Arc<dyn ConnectionTransport>);

/// Everything needed to register a freshly handshaken stream.
pub struct Registration {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub role: Role,
    pub ip_address: Option<IpAddr>,
    pub transport: Arc<dyn ConnectionTransport>,
}

/// Result of marking every connection for one heartbeat round.
#[derive(Default)]
pub struct HeartbeatRound {
    /// Connections that missed the previous deadline or failed a write.
    pub stale: Vec<ConnectionId>,
    /// Connections to ping; each was marked not-alive until it answers.
    pub pings: Vec<Target>,
}

pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    rooms: DashMap<RoomName, std::collections::HashSet<ConnectionId>>,
    /// Removed ids with their removal time, kept for at least one token TTL.
    retired: DashMap<ConnectionId, Timestamp>,
    retired_retention_millis: i64,
    clock: Arc<dyn Clock>,
}

impl ConnectionRegistry {
    /// Create a registry that remembers retired ids for `retired_retention_millis`.
    ///
    /// The retention must be at least the stream token TTL so that a token
    /// naming a removed connection cannot be replayed.
    pub fn new(clock: Arc<dyn Clock>, retired_retention_millis: i64) -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            retired: DashMap::new(),
            retired_retention_millis,
            clock,
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Register a connection. Fails when the id is live or was retired.
    pub fn register(&self, registration: Registration) -> Result<ConnectionSnapshot, RegistryError> {
        let now = self.now();
        self.prune_retired(now);

        let Registration {
            connection_id,
            user_id,
            role,
            ip_address,
            transport,
        } = registration;

        match self.connections.entry(connection_id.clone()) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(connection_id)),
            Entry::Vacant(vacant) => {
                if self.retired.contains_key(&connection_id) {
                    return Err(RegistryError::AlreadyRegistered(connection_id));
                }
                let connection =
                    Connection::new(connection_id, user_id, role, ip_address, transport, now);
                let snapshot = connection.snapshot();
                vacant.insert(connection);
                tracing::info!(
                    connection_id = %snapshot.id,
                    user_id = %snapshot.user_id,
                    role = %snapshot.role,
                    ip = ?snapshot.ip_address,
                    "connection registered"
                );
                Ok(snapshot)
            }
        }
    }

    /// Remove a connection, its room memberships and close its transport.
    ///
    /// Idempotent: returns `None` when the id is not registered.
    pub fn remove(&self, connection_id: &ConnectionId) -> Option<ConnectionSnapshot> {
        let removed = match self.connections.entry(connection_id.clone()) {
            Entry::Occupied(entry) => {
                let connection = entry.get();
                for room in &connection.rooms {
                    self.detach_from_room(room, connection_id);
                }
                self.retired.insert(connection_id.clone(), self.now());
                entry.remove()
            }
            Entry::Vacant(_) => return None,
        };

        removed.transport().close();
        tracing::info!(
            connection_id = %removed.id,
            user_id = %removed.user_id,
            rooms = removed.rooms.len(),
            "connection removed"
        );
        Some(removed.snapshot())
    }

    /// Remove every connection, closing all streams. Used on shutdown.
    pub fn remove_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.iter()
            .filter(|connection_id| self.remove(connection_id).is_some())
            .count()
    }

    /// Remove the connection only if it is still stale at the time of the call.
    ///
    /// Activity that arrived after the heartbeat round keeps the connection.
    pub fn reclaim_if_stale(&self, connection_id: &ConnectionId) -> Option<ConnectionSnapshot> {
        let removed = match self.connections.entry(connection_id.clone()) {
            Entry::Occupied(entry) if entry.get().is_stale() => {
                for room in &entry.get().rooms {
                    self.detach_from_room(room, connection_id);
                }
                self.retired.insert(connection_id.clone(), self.now());
                entry.remove()
            }
            _ => return None,
        };

        removed.transport().close();
        tracing::debug!(
            connection_id = %removed.id,
            user_id = %removed.user_id,
            last_activity = removed.last_activity.value(),
            "connection reclaimed"
        );
        Some(removed.snapshot())
    }

    /// Record inbound activity. Returns `false` for unknown ids.
    pub fn touch(&self, connection_id: &ConnectionId) -> bool {
        let now = self.now();
        match self.connections.get_mut(connection_id) {
            Some(mut connection) => {
                connection.touch(now);
                true
            }
            None => false,
        }
    }

    /// Flag a connection whose transport failed; the next sweep reclaims it.
    pub fn mark_failed(&self, connection_id: &ConnectionId) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut connection) => {
                connection.pending_reclaim = true;
                connection.is_alive = false;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<ConnectionSnapshot> {
        self.connections
            .get(connection_id)
            .map(|connection| connection.snapshot())
    }

    /// List connections ordered by connection time.
    pub fn list(&self, filter: ConnectionFilter) -> Vec<ConnectionSnapshot> {
        let mut snapshots: Vec<ConnectionSnapshot> = self
            .connections
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| {
            a.connected_at
                .cmp(&b.connected_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        snapshots
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.value().role == role)
            .count()
    }

    /// Start a heartbeat round: collect stale ids and mark the rest not-alive.
    pub fn begin_heartbeat_round(&self) -> HeartbeatRound {
        let mut round = HeartbeatRound::default();
        for mut entry in self.connections.iter_mut() {
            let connection = entry.value_mut();
            if connection.is_stale() {
                round.stale.push(connection.id.clone());
            } else {
                connection.is_alive = false;
                round.pings.push((connection.id.clone(), connection.transport()));
            }
        }
        round
    }

    pub fn transport_of(&self, connection_id: &ConnectionId) -> Option<Target> {
        self.connections
            .get(connection_id)
            .filter(|connection| !connection.pending_reclaim)
            .map(|connection| (connection.id.clone(), connection.transport()))
    }

    pub fn transports_by_role(&self, role: Role) -> Vec<Target> {
        self.collect_targets(|connection| connection.role == role)
    }

    pub fn transports_by_user(&self, user_id: &UserId) -> Vec<Target> {
        self.collect_targets(|connection| &connection.user_id == user_id)
    }

    pub fn all_transports(&self) -> Vec<Target> {
        self.collect_targets(|_| true)
    }

    fn collect_targets(&self, filter: impl Fn(&Connection) -> bool) -> Vec<Target> {
        self.connections
            .iter()
            .filter(|entry| !entry.value().pending_reclaim && filter(entry.value()))
            .map(|entry| (entry.key().clone(), entry.value().transport()))
            .collect()
    }

    fn prune_retired(&self, now: Timestamp) {
        let retention = self.retired_retention_millis;
        self.retired
            .retain(|_, retired_at| now.value() - retired_at.value() < retention);
    }
}
