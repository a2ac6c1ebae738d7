//! UseCase: 管理者によるブロードキャスト
//!
//! 対象（全体・ロール・ルーム）に応じて配信先を選び、
//! メッセージを HTML エスケープしてから配信します。

use std::sync::Arc;

use serde_json::json;
use switchboard_shared::time::Clock;

use crate::{
    domain::{
        BroadcastTarget, Event, EventKind, Identity, Priority, Role, RoomName, Sender, Timestamp,
        sanitize::escape_html,
    },
    infrastructure::dispatcher::{BroadcastDispatcher, DispatchReport},
};

use super::error::AdminError;

/// A validated broadcast request.
#[derive(Debug, Clone)]
pub struct AdminBroadcast {
    pub target: BroadcastTarget,
    pub message: String,
    pub room_id: Option<String>,
    pub priority: Priority,
}

pub struct AdminBroadcastUseCase {
    dispatcher: Arc<BroadcastDispatcher>,
    clock: Arc<dyn Clock>,
}

impl AdminBroadcastUseCase {
    pub fn new(dispatcher: Arc<BroadcastDispatcher>, clock: Arc<dyn Clock>) -> Self {
        Self { dispatcher, clock }
    }

    pub fn execute(
        &self,
        caller: &Identity,
        broadcast: AdminBroadcast,
    ) -> Result<DispatchReport, AdminError> {
        if !caller.is_admin() {
            return Err(AdminError::Forbidden);
        }
        let sender = Sender::User(caller.clone());
        let timestamp = Timestamp::new(self.clock.now_millis());
        let payload = |role: Option<Role>| {
            json!({
                "message": escape_html(&broadcast.message),
                "priority": broadcast.priority,
                "role": role,
            })
        };

        let report = match broadcast.target {
            BroadcastTarget::All => {
                let event = Event::new(EventKind::AdminBroadcast, payload(None), timestamp)
                    .with_user(caller.user_id.clone());
                self.dispatcher.to_all(&sender, &event)?
            }
            BroadcastTarget::Admin | BroadcastTarget::Client => {
                let role = if broadcast.target == BroadcastTarget::Admin {
                    Role::Admin
                } else {
                    Role::Client
                };
                let event = Event::new(EventKind::RoleBroadcast, payload(Some(role)), timestamp)
                    .with_user(caller.user_id.clone());
                self.dispatcher.to_role(&sender, role, &event)?
            }
            BroadcastTarget::Room => {
                let room_id = broadcast
                    .room_id
                    .clone()
                    .ok_or_else(|| AdminError::BadRequest("room target requires roomId".to_string()))?;
                let room = RoomName::new(room_id)?;
                let event = Event::new(EventKind::AdminBroadcast, payload(None), timestamp)
                    .with_user(caller.user_id.clone())
                    .with_room(room.clone());
                self.dispatcher.to_room(&sender, &room, &event)?
            }
        };
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use switchboard_shared::time::FixedClock;

    use super::*;
    use crate::{
        domain::{ConnectionId, ConnectionIdFactory, UserId},
        infrastructure::{
            registry::{ConnectionRegistry, Registration},
            transport::recording::RecordingTransport,
        },
    };

    struct Fixture {
        usecase: AdminBroadcastUseCase,
        registry: Arc<ConnectionRegistry>,
        ids: ConnectionIdFactory,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = Arc::new(FixedClock::new(0));
            let registry = Arc::new(ConnectionRegistry::new(clock.clone(), 300_000));
            let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone()));
            Self {
                usecase: AdminBroadcastUseCase::new(dispatcher, clock),
                registry,
                ids: ConnectionIdFactory::new(),
            }
        }

        fn connect(&self, user: &str, role: Role) -> (ConnectionId, Arc<RecordingTransport>) {
            let id = self.ids.generate();
            let transport = Arc::new(RecordingTransport::default());
            self.registry
                .register(Registration {
                    connection_id: id.clone(),
                    user_id: UserId::try_from(user).unwrap(),
                    role,
                    ip_address: None,
                    transport: transport.clone(),
                })
                .unwrap();
            (id, transport)
        }
    }

    fn admin() -> Identity {
        Identity::new(UserId::try_from("root").unwrap(), Role::Admin)
    }

    fn broadcast(target: BroadcastTarget, room_id: Option<&str>) -> AdminBroadcast {
        AdminBroadcast {
            target,
            message: "<script>alert(1)</script>".to_string(),
            room_id: room_id.map(str::to_string),
            priority: Priority::High,
        }
    }

    #[test]
    fn test_broadcast_to_clients_escapes_message() {
        // テスト項目: client 向けブロードキャストは client にだけ、エスケープされて届く
        // given (前提条件):
        let fixture = Fixture::new();
        let (_a, alice) = fixture.connect("alice", Role::Client);
        let (_r, root) = fixture.connect("root", Role::Admin);

        // when (操作):
        let report = fixture
            .usecase
            .execute(&admin(), broadcast(BroadcastTarget::Client, None))
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        let payloads = alice.payloads();
        assert_eq!(payloads[0]["message"], "&lt;script&gt;alert(1)&lt;/script&gt;");
        assert_eq!(payloads[0]["priority"], "high");
        assert_eq!(payloads[0]["role"], "client");
        assert!(root.payloads().is_empty());
    }

    #[test]
    fn test_broadcast_to_room_requires_room_id() {
        // テスト項目: ルーム対象で roomId がなければ BadRequest
        // given (前提条件):
        let fixture = Fixture::new();

        // when (操作):
        let result = fixture
            .usecase
            .execute(&admin(), broadcast(BroadcastTarget::Room, None));

        // then (期待する結果):
        assert!(matches!(result, Err(AdminError::BadRequest(_))));
    }

    #[test]
    fn test_broadcast_to_room_reaches_members() {
        // テスト項目: ルーム対象のブロードキャストはメンバーにだけ届く
        // given (前提条件):
        let fixture = Fixture::new();
        let (a, alice) = fixture.connect("alice", Role::Client);
        let (_b, bob) = fixture.connect("bob", Role::Client);
        fixture
            .registry
            .join(&a, &RoomName::try_from("project-7").unwrap())
            .unwrap();

        // when (操作):
        let report = fixture
            .usecase
            .execute(&admin(), broadcast(BroadcastTarget::Room, Some("project-7")))
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        assert_eq!(alice.payloads().len(), 1);
        assert!(bob.payloads().is_empty());
    }

    #[test]
    fn test_client_cannot_broadcast() {
        // テスト項目: client ロールの呼び出しは拒否される
        // given (前提条件):
        let fixture = Fixture::new();
        let (_a, alice) = fixture.connect("alice", Role::Client);
        let caller = Identity::new(UserId::try_from("alice").unwrap(), Role::Client);

        // when (操作):
        let result = fixture
            .usecase
            .execute(&caller, broadcast(BroadcastTarget::All, None));

        // then (期待する結果):
        assert!(matches!(result, Err(AdminError::Forbidden)));
        assert!(alice.payloads().is_empty());
    }
}
