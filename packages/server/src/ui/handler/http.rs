//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    domain::{ConnectionId, EventKind, RoomName, Sender, UserId},
    infrastructure::dto::http::{
        AdminBroadcastRequest, ConnectionDto, DispatchReportDto, IssueTokenResponse,
        ListConnectionsQuery, NotifyRequest, RoomSummaryDto, SendEventResponse, StatsDto,
    },
    ui::state::AppState,
    usecase::{AdminBroadcast, AdminError, Notification, SendOutcome},
};

use super::{error::ApiError, identity::CallerIdentity};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Issue a stream token for the caller
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<IssueTokenResponse>, ApiError> {
    let issued = state.issue_token_usecase.execute(&caller)?;
    Ok(Json(IssueTokenResponse {
        token: issued.token,
        connection_id: issued.connection_id.into_string(),
        expires_in: issued.expires_in_secs,
    }))
}

/// Client-originated event on one of the caller's connections
///
/// The body is taken raw so that the size limit applies before parsing.
pub async fn send_event(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(connection_id): Path<String>,
    body: Bytes,
) -> Result<Json<SendEventResponse>, ApiError> {
    let connection_id = ConnectionId::new(connection_id)
        .map_err(|e| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))?;

    let outcome = state
        .send_event_usecase
        .execute(&caller, &connection_id, &body)?;

    // Domain Model から DTO への変換
    let response = match outcome {
        SendOutcome::Acknowledged => SendEventResponse {
            status: "acknowledged".to_string(),
            report: None,
        },
        SendOutcome::MembershipUpdated { .. } => SendEventResponse {
            status: "membership_updated".to_string(),
            report: None,
        },
        SendOutcome::Dispatched(report) => SendEventResponse {
            status: "dispatched".to_string(),
            report: Some(report.into()),
        },
        SendOutcome::Ignored => SendEventResponse {
            status: "ignored".to_string(),
            report: None,
        },
    };
    Ok(Json(response))
}

/// Administrative broadcast
pub async fn admin_broadcast(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(request): Json<AdminBroadcastRequest>,
) -> Result<Json<DispatchReportDto>, ApiError> {
    let report = state.admin_broadcast_usecase.execute(
        &caller,
        AdminBroadcast {
            target: request.target,
            message: request.message,
            room_id: request.room_id,
            priority: request.priority,
        },
    )?;
    Ok(Json(report.into()))
}

/// Domain notification from a collaborator
pub async fn admin_notify(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Json(request): Json<NotifyRequest>,
) -> Result<Json<DispatchReportDto>, ApiError> {
    let user_id = request
        .user_id
        .map(UserId::new)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let room_id = request
        .room_id
        .map(RoomName::new)
        .transpose()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let report = state.notify_usecase.execute(
        &Sender::User(caller),
        Notification {
            kind: EventKind::from_wire(&request.r#type),
            payload: request.payload,
            user_id,
            room_id,
        },
    )?;
    Ok(Json(report.into()))
}

/// List connections, optionally filtered by role
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Query(query): Query<ListConnectionsQuery>,
) -> Result<Json<Vec<ConnectionDto>>, ApiError> {
    let connections = state
        .admin_query_usecase
        .list_connections(&caller, query.role)?;
    Ok(Json(connections.into_iter().map(ConnectionDto::from).collect()))
}

/// List rooms with member counts
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<Vec<RoomSummaryDto>>, ApiError> {
    let rooms = state.admin_query_usecase.list_rooms(&caller)?;
    Ok(Json(rooms.into_iter().map(RoomSummaryDto::from).collect()))
}

/// Connection and room totals
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
) -> Result<Json<StatsDto>, ApiError> {
    let stats = state.admin_query_usecase.stats(&caller)?;
    Ok(Json(StatsDto {
        total_connections: stats.total_connections,
        admin_connections: stats.admin_connections,
        client_connections: stats.client_connections,
        rooms: stats.rooms,
    }))
}

/// Forced disconnect; 204 whether or not the connection existed
pub async fn disconnect_connection(
    State(state): State<Arc<AppState>>,
    CallerIdentity(caller): CallerIdentity,
    Path(connection_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Ok(connection_id) = ConnectionId::new(connection_id) {
        state.disconnect_usecase.execute(&caller, &connection_id)?;
    } else if !caller.is_admin() {
        return Err(AdminError::Forbidden.into());
    }
    Ok(StatusCode::NO_CONTENT)
}
