//! Conversion logic between DTOs and domain entities.

use std::sync::Arc;

use switchboard_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{ConnectionSnapshot, DispatchError, Event, OutboundFrame, RoomSummary},
    infrastructure::{
        dispatcher::DispatchReport,
        dto::{
            event::EventEnvelope,
            http::{ConnectionDto, DispatchReportDto, RoomSummaryDto},
        },
    },
};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&Event> for EventEnvelope {
    fn from(event: &Event) -> Self {
        Self {
            r#type: event.kind.as_str().to_string(),
            payload: event.payload.clone(),
            timestamp: event.timestamp.value(),
            id: event.id.as_str().to_string(),
            user_id: event.user_id.as_ref().map(|id| id.as_str().to_string()),
            room_id: event.room_id.as_ref().map(|room| room.as_str().to_string()),
        }
    }
}

impl OutboundFrame {
    /// Serialize an event once; the frame is then shared by every recipient.
    pub fn from_event(event: &Event) -> Result<Self, DispatchError> {
        let data = serde_json::to_string(&EventEnvelope::from(event))
            .map_err(|e| DispatchError::Serialization(e.to_string()))?;
        Ok(Self {
            event_id: Arc::from(event.id.as_str()),
            kind: Arc::from(event.kind.as_str()),
            data: Arc::from(data),
        })
    }
}

impl From<ConnectionSnapshot> for ConnectionDto {
    fn from(model: ConnectionSnapshot) -> Self {
        Self {
            connection_id: model.id.into_string(),
            user_id: model.user_id.into_string(),
            role: model.role,
            rooms: model.rooms.into_iter().map(|room| room.into_string()).collect(),
            connected_at: timestamp_to_rfc3339(model.connected_at.value()),
            last_activity: timestamp_to_rfc3339(model.last_activity.value()),
            is_alive: model.is_alive,
            ip_address: model.ip_address.map(|ip| ip.to_string()),
        }
    }
}

impl From<RoomSummary> for RoomSummaryDto {
    fn from(model: RoomSummary) -> Self {
        Self {
            name: model.name.into_string(),
            member_count: model.member_count,
        }
    }
}

impl From<DispatchReport> for DispatchReportDto {
    fn from(report: DispatchReport) -> Self {
        Self {
            targeted: report.targeted,
            delivered: report.delivered,
            failed: report.failed,
        }
    }
}
