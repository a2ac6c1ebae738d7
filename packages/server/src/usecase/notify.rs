//! UseCase: ドメイン通知の配信
//!
//! 外部のコラボレーター（決済 Webhook、プロジェクト・チケット・請求書の更新）が
//! イベントを流し込む入口です。
//!
//! 配信先の決定順序:
//! 1. `user_id` があればそのユーザーの全接続
//! 2. `room_id` があればそのルーム
//! 3. `project_update` で `payload.projectId` があれば `project-<id>` ルーム
//! 4. それ以外は全接続

use std::sync::Arc;

use serde_json::Value;
use switchboard_shared::time::Clock;

use crate::{
    domain::{
        Event, EventKind, RoomName, Sender, Timestamp, UserId, sanitize::sanitize_payload,
    },
    infrastructure::dispatcher::{BroadcastDispatcher, DispatchReport},
};

use super::error::NotifyError;

/// A domain notification addressed by the collaborator.
#[derive(Debug, Clone)]
pub struct Notification {
    pub kind: EventKind,
    pub payload: Value,
    pub user_id: Option<UserId>,
    pub room_id: Option<RoomName>,
}

/// Room that collects everyone following one project.
pub fn project_room(project_id: &str) -> Result<RoomName, NotifyError> {
    Ok(RoomName::new(format!("project-{project_id}"))?)
}

pub struct NotifyUseCase {
    dispatcher: Arc<BroadcastDispatcher>,
    clock: Arc<dyn Clock>,
}

impl NotifyUseCase {
    pub fn new(dispatcher: Arc<BroadcastDispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self { dispatcher, clock }
    }

    pub fn execute(
        &self,
        sender: &Sender,
        notification: Notification,
    ) -> Result<DispatchReport, NotifyError> {
        let Notification {
            kind,
            payload,
            user_id,
            room_id,
        } = notification;

        if !kind.is_domain_notification() {
            return Err(NotifyError::NotNotification(kind.as_str().to_string()));
        }

        let room_id = match room_id {
            Some(room) => Some(room),
            None if kind == EventKind::ProjectUpdate && user_id.is_none() => {
                project_id(&payload).map(|id| project_room(&id)).transpose()?
            }
            None => None,
        };

        let mut event = Event::new(
            kind,
            sanitize_payload(payload)?,
            Timestamp::new(self.clock.now_millis()),
        );

        let report = if let Some(user_id) = user_id {
            event = event.with_user(user_id.clone());
            self.dispatcher.to_user(sender, &user_id, &event)?
        } else if let Some(room) = room_id {
            event = event.with_room(room.clone());
            self.dispatcher.to_room(sender, &room, &event)?
        } else {
            self.dispatcher.to_all(sender, &event)?
        };
        Ok(report)
    }

    /// Payment completed: every connection of the paying client.
    pub fn payment_received(
        &self,
        user_id: UserId,
        payload: Value,
    ) -> Result<DispatchReport, NotifyError> {
        self.execute(
            &Sender::System,
            Notification {
                kind: EventKind::PaymentReceived,
                payload,
                user_id: Some(user_id),
                room_id: None,
            },
        )
    }

    /// Project changed: everyone in the project's room.
    pub fn project_updated(
        &self,
        project_id: &str,
        payload: Value,
    ) -> Result<DispatchReport, NotifyError> {
        self.execute(
            &Sender::System,
            Notification {
                kind: EventKind::ProjectUpdate,
                payload,
                user_id: None,
                room_id: Some(project_room(project_id)?),
            },
        )
    }
}

fn project_id(payload: &Value) -> Option<String> {
    match payload.get("projectId")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}
