//! UseCase: クライアントからのイベント送信処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SendEventUseCase::execute() メソッド
//! - サイズ上限・所有者チェック・種別ごとの振り分け
//!
//! ### なぜこのテストが必要か
//! - 64 KiB を超えるイベントはディスパッチャに届く前に拒否される必要がある
//! - 他人の接続 ID を使った送信や、client ロールによる制限付き種別の送信を防ぐ
//! - ルームの参加・離脱が本人の接続にだけ確認応答されることを保証する
//!
//! ### どのような状況を想定しているか
//! - 正常系：heartbeat、join_room / leave_room、room_message、admin_broadcast
//! - 異常系：サイズ超過、他人の接続、未参加ルームへの送信、制限付き種別
//! - エッジケース：未知の種別（受理するが何もしない）

use std::sync::Arc;

use serde_json::{Value, json};
use switchboard_shared::time::Clock;

use crate::{
    domain::{
        ConnectionId, ConnectionSnapshot, Event, EventKind, Identity, Role, RoomName, Sender,
        Timestamp, authorize, sanitize::sanitize_payload,
    },
    infrastructure::{
        dispatcher::{BroadcastDispatcher, DispatchReport},
        dto::http::SendEventRequest,
        registry::ConnectionRegistry,
    },
};

use super::error::SendEventError;

/// What happened to an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Liveness only (`heartbeat`, `pong`).
    Acknowledged,
    /// `join_room` / `leave_room`; `changed` is false for a no-op.
    MembershipUpdated { room: RoomName, changed: bool },
    Dispatched(DispatchReport),
    /// Accepted without dispatcher action.
    Ignored,
}

pub struct SendEventUseCase {
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    clock: Arc<dyn Clock>,
    max_event_bytes: usize,
}

impl SendEventUseCase {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<BroadcastDispatcher>,
        clock: Arc<dyn Clock>,
        max_event_bytes: usize,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            clock,
            max_event_bytes,
        }
    }

    /// Handle one raw event body sent by `caller` on `connection_id`.
    pub fn execute(
        &self,
        caller: &Identity,
        connection_id: &ConnectionId,
        body: &[u8],
    ) -> Result<SendOutcome, SendEventError> {
        // 1. サイズ上限（パース前に判定）
        if body.len() > self.max_event_bytes {
            return Err(SendEventError::PayloadTooLarge {
                size: body.len(),
                max: self.max_event_bytes,
            });
        }

        // 2. パース
        let request: SendEventRequest = serde_json::from_slice(body)
            .map_err(|e| SendEventError::Malformed(e.to_string()))?;

        // 3. 接続の所有者チェック
        let connection = self
            .registry
            .get(connection_id)
            .ok_or_else(|| SendEventError::ConnectionNotFound(connection_id.clone()))?;
        if connection.user_id != caller.user_id {
            return Err(SendEventError::Forbidden(format!(
                "connection '{}' does not belong to '{}'",
                connection_id, caller.user_id
            )));
        }

        // 4. 受信したメッセージはすべて活動として記録
        self.registry.touch(connection_id);

        // 5. 種別ごとの振り分け（ロールはトークン発行時に束縛されたもの）
        let kind = EventKind::from_wire(&request.r#type);
        let sender = Sender::user(connection.user_id.clone(), connection.role);
        authorize(&sender, &kind)?;

        match kind {
            EventKind::Heartbeat | EventKind::Pong => {
                tracing::trace!(connection_id = %connection_id, "liveness message");
                Ok(SendOutcome::Acknowledged)
            }
            EventKind::JoinRoom => self.join(&connection, request.room_id),
            EventKind::LeaveRoom => self.leave(&connection, request.room_id),
            EventKind::RoomMessage => {
                let room = required_room(&kind, request.room_id)?;
                if connection.role != Role::Admin && !connection.rooms.contains(&room) {
                    return Err(SendEventError::Forbidden(format!(
                        "connection '{}' is not a member of room '{}'",
                        connection_id, room
                    )));
                }
                let event = self
                    .event(kind, sanitize_payload(request.payload)?)
                    .with_user(connection.user_id.clone())
                    .with_room(room.clone());
                let report = self.dispatcher.to_room(&sender, &room, &event)?;
                Ok(SendOutcome::Dispatched(report))
            }
            EventKind::AdminBroadcast => {
                let event = self
                    .event(kind, sanitize_payload(request.payload)?)
                    .with_user(connection.user_id.clone());
                let report = self.dispatcher.to_all(&sender, &event)?;
                Ok(SendOutcome::Dispatched(report))
            }
            EventKind::RoleBroadcast => {
                let role = target_role(&request.payload)?;
                let event = self
                    .event(kind, sanitize_payload(request.payload)?)
                    .with_user(connection.user_id.clone());
                let report = self.dispatcher.to_role(&sender, role, &event)?;
                Ok(SendOutcome::Dispatched(report))
            }
            other => {
                tracing::debug!(
                    connection_id = %connection_id,
                    kind = %other,
                    "event accepted without dispatch"
                );
                Ok(SendOutcome::Ignored)
            }
        }
    }

    fn join(
        &self,
        connection: &ConnectionSnapshot,
        room_id: Option<String>,
    ) -> Result<SendOutcome, SendEventError> {
        let room = required_room(&EventKind::JoinRoom, room_id)?;
        let changed = self.registry.join(&connection.id, &room)?;
        let members = self.registry.members_of(&room).len();
        self.acknowledge(connection, EventKind::RoomJoined, &room, members)?;
        Ok(SendOutcome::MembershipUpdated { room, changed })
    }

    fn leave(
        &self,
        connection: &ConnectionSnapshot,
        room_id: Option<String>,
    ) -> Result<SendOutcome, SendEventError> {
        let room = required_room(&EventKind::LeaveRoom, room_id)?;
        let changed = self.registry.leave(&connection.id, &room)?;
        let members = self.registry.members_of(&room).len();
        self.acknowledge(connection, EventKind::RoomLeft, &room, members)?;
        Ok(SendOutcome::MembershipUpdated { room, changed })
    }

    fn acknowledge(
        &self,
        connection: &ConnectionSnapshot,
        kind: EventKind,
        room: &RoomName,
        members: usize,
    ) -> Result<(), SendEventError> {
        let event = self
            .event(kind, json!({ "roomId": room.as_str(), "memberCount": members }))
            .with_room(room.clone());
        self.dispatcher
            .to_connection(&Sender::System, &connection.id, &event)?;
        Ok(())
    }

    fn event(&self, kind: EventKind, payload: Value) -> Event {
        Event::new(kind, payload, Timestamp::new(self.clock.now_millis()))
    }
}

fn required_room(kind: &EventKind, room_id: Option<String>) -> Result<RoomName, SendEventError> {
    let room_id = room_id.ok_or_else(|| SendEventError::MissingRoom(kind.as_str().to_string()))?;
    Ok(RoomName::new(room_id)?)
}

fn target_role(payload: &Value) -> Result<Role, SendEventError> {
    payload
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| SendEventError::Malformed("role_broadcast requires payload.role".to_string()))?
        .parse::<Role>()
        .map_err(|e| SendEventError::Malformed(e.to_string()))
}
