//! Room membership on top of the connection registry.
//!
//! A room exists only while it has members: the index entry is dropped when
//! the last member leaves, so there is never an empty room to clean up.

use std::collections::{BTreeSet, HashSet};

use crate::domain::{ConnectionId, RegistryError, RoomName, RoomSummary};

use super::{ConnectionRegistry, Target};

pub const MAX_ROOMS_PER_CONNECTION: usize = 64;

impl ConnectionRegistry {
    /// Add the connection to `room`. Returns `false` when it was already a member.
    pub fn join(&self, connection_id: &ConnectionId, room: &RoomName) -> Result<bool, RegistryError> {
        let mut connection = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| RegistryError::NotFound(connection_id.clone()))?;

        if connection.rooms.contains(room) {
            return Ok(false);
        }
        if connection.rooms.len() >= MAX_ROOMS_PER_CONNECTION {
            return Err(RegistryError::RoomLimitExceeded {
                connection_id: connection_id.clone(),
                room: room.clone(),
                max: MAX_ROOMS_PER_CONNECTION,
            });
        }

        connection.rooms.insert(room.clone());
        self.rooms
            .entry(room.clone())
            .or_default()
            .insert(connection_id.clone());

        tracing::info!(connection_id = %connection_id, room = %room, "joined room");
        Ok(true)
    }

    /// Remove the connection from `room`. Returns `false` when it was not a member.
    pub fn leave(&self, connection_id: &ConnectionId, room: &RoomName) -> Result<bool, RegistryError> {
        let mut connection = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| RegistryError::NotFound(connection_id.clone()))?;

        if !connection.rooms.remove(room) {
            return Ok(false);
        }
        self.detach_from_room(room, connection_id);

        tracing::info!(connection_id = %connection_id, room = %room, "left room");
        Ok(true)
    }

    pub fn members_of(&self, room: &RoomName) -> HashSet<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Rooms of a connection; empty for unknown ids.
    pub fn rooms_of(&self, connection_id: &ConnectionId) -> BTreeSet<RoomName> {
        self.connections
            .get(connection_id)
            .map(|connection| connection.rooms.clone())
            .unwrap_or_default()
    }

    /// All non-empty rooms, sorted by name.
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|entry| RoomSummary {
                name: entry.key().clone(),
                member_count: entry.value().len(),
            })
            .filter(|summary| summary.member_count > 0)
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        rooms
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Targets for a room dispatch, resolved from a snapshot of the member set.
    ///
    /// Connections joining after the snapshot is taken are not included.
    pub fn transports_in_room(&self, room: &RoomName) -> Vec<Target> {
        let members = self.members_of(room);
        members
            .iter()
            .filter_map(|connection_id| self.transport_of(connection_id))
            .collect()
    }

    /// Drop `connection_id` from the room index, removing the room when it
    /// becomes empty. Callers hold the connection's entry lock.
    pub(super) fn detach_from_room(&self, room: &RoomName, connection_id: &ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(connection_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }
}
