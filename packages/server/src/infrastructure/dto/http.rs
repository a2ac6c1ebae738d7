//! HTTP API DTOs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{BroadcastTarget, Priority, Role};

/// `POST /api/realtime/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    pub token: String,
    pub connection_id: String,
    pub expires_in: i64,
}

/// `GET /api/realtime/stream?token=`
#[derive(Debug, Clone, Deserialize)]
pub struct StreamQuery {
    pub token: String,
}

/// `POST /api/realtime/connections/{connectionId}/events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEventRequest {
    pub r#type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

/// Result of one dispatch, as returned by the send/broadcast/notify endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DispatchReportDto {
    pub targeted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// `POST /api/realtime/connections/{connectionId}/events` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEventResponse {
    /// `dispatched`, `membership_updated`, `acknowledged` or `ignored`
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<DispatchReportDto>,
}

/// `POST /api/realtime/admin/broadcast`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBroadcastRequest {
    pub target: BroadcastTarget,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub priority: Priority,
}

/// `POST /api/realtime/admin/notify`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub r#type: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}

/// `GET /api/realtime/admin/connections?role=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListConnectionsQuery {
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDto {
    pub connection_id: String,
    pub user_id: String,
    pub role: Role,
    pub rooms: Vec<String>,
    /// RFC 3339 (UTC)
    pub connected_at: String,
    /// RFC 3339 (UTC)
    pub last_activity: String,
    pub is_alive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummaryDto {
    pub name: String,
    pub member_count: usize,
}

/// `GET /api/realtime/admin/stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub total_connections: usize,
    pub admin_connections: usize,
    pub client_connections: usize,
    pub rooms: usize,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
