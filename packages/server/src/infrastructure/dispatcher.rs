//! Broadcast dispatcher
//!
//! ## 責務
//!
//! - 送信者の権限チェック（制限付きの種別は admin かシステムのみ）
//! - 配信先の解決（レジストリのスナップショット）
//! - 1 回だけシリアライズし、各 transport に push する
//!
//! ## 設計ノート
//!
//! push はレジストリのロックを解放した後に行います。
//! 一部の接続への送信失敗は許容し、失敗した接続は回収対象として印を付けるだけで、
//! 呼び出し元にエラーは返しません。

use std::sync::Arc;

use crate::{
    domain::{
        ConnectionId, DispatchError, Event, OutboundFrame, Role, RoomName, Sender, UserId,
        authorize,
    },
    infrastructure::registry::{ConnectionRegistry, Target},
};

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Transports resolved at dispatch time.
    pub targeted: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct BroadcastDispatcher {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn to_connection(
        &self,
        sender: &Sender,
        connection_id: &ConnectionId,
        event: &Event,
    ) -> Result<DispatchReport, DispatchError> {
        authorize(sender, &event.kind)?;
        let targets: Vec<Target> = self.registry.transport_of(connection_id).into_iter().collect();
        self.deliver(sender, "connection", targets, event)
    }

    /// Every connection of one user (a user may hold several streams).
    pub fn to_user(
        &self,
        sender: &Sender,
        user_id: &UserId,
        event: &Event,
    ) -> Result<DispatchReport, DispatchError> {
        authorize(sender, &event.kind)?;
        let targets = self.registry.transports_by_user(user_id);
        self.deliver(sender, "user", targets, event)
    }

    pub fn to_role(
        &self,
        sender: &Sender,
        role: Role,
        event: &Event,
    ) -> Result<DispatchReport, DispatchError> {
        authorize(sender, &event.kind)?;
        let targets = self.registry.transports_by_role(role);
        self.deliver(sender, "role", targets, event)
    }

    /// Members at the time of the call; later joins do not receive this event.
    pub fn to_room(
        &self,
        sender: &Sender,
        room: &RoomName,
        event: &Event,
    ) -> Result<DispatchReport, DispatchError> {
        authorize(sender, &event.kind)?;
        let targets = self.registry.transports_in_room(room);
        self.deliver(sender, "room", targets, event)
    }

    pub fn to_all(&self, sender: &Sender, event: &Event) -> Result<DispatchReport, DispatchError> {
        authorize(sender, &event.kind)?;
        let targets = self.registry.all_transports();
        self.deliver(sender, "all", targets, event)
    }

    fn deliver(
        &self,
        sender: &Sender,
        scope: &'static str,
        targets: Vec<Target>,
        event: &Event,
    ) -> Result<DispatchReport, DispatchError> {
        let frame = OutboundFrame::from_event(event)?;
        let mut report = DispatchReport {
            targeted: targets.len(),
            ..DispatchReport::default()
        };

        for (connection_id, transport) in targets {
            // ブロードキャストでは一部の送信失敗を許容
            match transport.push(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        connection_id = %connection_id,
                        event_id = %event.id,
                        error = %e,
                        "failed to push event, marking connection for reclamation"
                    );
                    self.registry.mark_failed(&connection_id);
                }
            }
        }

        if event.kind.is_liveness() {
            tracing::trace!(kind = %event.kind, delivered = report.delivered, "liveness event dispatched");
        } else {
            tracing::info!(
                sender = %sender,
                scope,
                kind = %event.kind,
                event_id = %event.id,
                targeted = report.targeted,
                delivered = report.delivered,
                failed = report.failed,
                "event dispatched"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_shared::time::FixedClock;

    use super::*;
    use crate::{
        domain::{
            ConnectionIdFactory, ConnectionTransport, EventKind, Timestamp, TransportError,
            transport::MockConnectionTransport,
        },
        infrastructure::{registry::Registration, transport::recording::RecordingTransport},
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 各配信先（接続・ユーザー・ロール・ルーム・全体）への配信
    // - 権限のない送信者による制限付き種別の配信拒否
    // - 一部の transport の失敗が他の配信を妨げないこと
    // ========================================

    struct Fixture {
        registry: Arc<ConnectionRegistry>,
        dispatcher: BroadcastDispatcher,
        ids: ConnectionIdFactory,
    }

    impl Fixture {
        fn new() -> Self {
            let registry = Arc::new(ConnectionRegistry::new(
                Arc::new(FixedClock::new(1_000)),
                300_000,
            ));
            Self {
                dispatcher: BroadcastDispatcher::new(registry.clone()),
                registry,
                ids: ConnectionIdFactory::new(),
            }
        }

        fn connect_with(
            &self,
            user: &str,
            role: Role,
            transport: Arc<dyn ConnectionTransport>,
        ) -> ConnectionId {
            let id = self.ids.generate();
            self.registry
                .register(Registration {
                    connection_id: id.clone(),
                    user_id: UserId::try_from(user).unwrap(),
                    role,
                    ip_address: None,
                    transport,
                })
                .unwrap();
            id
        }

        fn connect(&self, user: &str, role: Role) -> (ConnectionId, Arc<RecordingTransport>) {
            let transport = Arc::new(RecordingTransport::default());
            let id = self.connect_with(user, role, transport.clone());
            (id, transport)
        }
    }

    fn event(kind: EventKind) -> Event {
        Event::new(kind, json!({"message": "hello"}), Timestamp::new(1_000))
    }

    fn admin() -> Sender {
        Sender::user(UserId::try_from("root").unwrap(), Role::Admin)
    }

    fn client() -> Sender {
        Sender::user(UserId::try_from("alice").unwrap(), Role::Client)
    }

    fn room(name: &str) -> RoomName {
        RoomName::try_from(name).unwrap()
    }

    #[test]
    fn test_to_room_delivers_to_members_only() {
        // テスト項目: ルーム配信はメンバーにだけ届く
        // given (前提条件):
        let fixture = Fixture::new();
        let (a, transport_a) = fixture.connect("alice", Role::Client);
        let (_b, transport_b) = fixture.connect("bob", Role::Client);
        fixture.registry.join(&a, &room("project-42")).unwrap();

        // when (操作):
        let report = fixture
            .dispatcher
            .to_room(&Sender::System, &room("project-42"), &event(EventKind::ProjectUpdate))
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, 1);
        assert_eq!(transport_a.kinds(), vec!["project_update".to_string()]);
        assert!(transport_b.kinds().is_empty());
    }

    #[test]
    fn test_to_room_uses_membership_snapshot() {
        // テスト項目: 配信後に参加した接続には届かない
        // given (前提条件):
        let fixture = Fixture::new();
        let (a, transport_a) = fixture.connect("alice", Role::Client);
        let (late, transport_late) = fixture.connect("bob", Role::Client);
        fixture.registry.join(&a, &room("support")).unwrap();

        // when (操作):
        let report = fixture
            .dispatcher
            .to_room(&client(), &room("support"), &event(EventKind::RoomMessage))
            .unwrap();
        fixture.registry.join(&late, &room("support")).unwrap();

        // then (期待する結果):
        assert_eq!(report.targeted, 1);
        assert_eq!(transport_a.kinds().len(), 1);
        assert!(transport_late.kinds().is_empty());
    }

    #[test]
    fn test_client_cannot_broadcast_restricted_kind() {
        // テスト項目: client ロールの送信者による admin_broadcast は誰にも届かない
        // given (前提条件):
        let fixture = Fixture::new();
        let (_a, transport_a) = fixture.connect("alice", Role::Client);
        let (_r, transport_root) = fixture.connect("root", Role::Admin);

        // when (操作):
        let result = fixture
            .dispatcher
            .to_all(&client(), &event(EventKind::AdminBroadcast));

        // then (期待する結果):
        assert_eq!(
            result,
            Err(DispatchError::Unauthorized {
                kind: "admin_broadcast".to_string()
            })
        );
        assert!(transport_a.kinds().is_empty());
        assert!(transport_root.kinds().is_empty());
    }

    #[test]
    fn test_admin_to_role_reaches_only_that_role() {
        // テスト項目: ロール配信は指定ロールの接続にだけ届く
        // given (前提条件):
        let fixture = Fixture::new();
        let (_a, transport_a) = fixture.connect("alice", Role::Client);
        let (_b, transport_b) = fixture.connect("bob", Role::Client);
        let (_r, transport_root) = fixture.connect("root", Role::Admin);

        // when (操作):
        let report = fixture
            .dispatcher
            .to_role(&admin(), Role::Client, &event(EventKind::RoleBroadcast))
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        assert_eq!(transport_a.kinds().len(), 1);
        assert_eq!(transport_b.kinds().len(), 1);
        assert!(transport_root.kinds().is_empty());
    }

    #[test]
    fn test_to_user_reaches_every_connection_of_the_user() {
        // テスト項目: ユーザー配信はそのユーザーの全接続に届く
        // given (前提条件):
        let fixture = Fixture::new();
        let (_tab1, transport_tab1) = fixture.connect("alice", Role::Client);
        let (_tab2, transport_tab2) = fixture.connect("alice", Role::Client);
        let (_b, transport_b) = fixture.connect("bob", Role::Client);

        // when (操作):
        let report = fixture
            .dispatcher
            .to_user(
                &Sender::System,
                &UserId::try_from("alice").unwrap(),
                &event(EventKind::PaymentReceived),
            )
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, 2);
        assert_eq!(transport_tab1.kinds().len(), 1);
        assert_eq!(transport_tab2.kinds().len(), 1);
        assert!(transport_b.kinds().is_empty());
    }

    #[test]
    fn test_to_connection_unknown_id_delivers_nothing() {
        // テスト項目: 存在しない接続への配信は 0 件で成功する
        // given (前提条件):
        let fixture = Fixture::new();
        let unknown = fixture.ids.generate();

        // when (操作):
        let report = fixture
            .dispatcher
            .to_connection(&Sender::System, &unknown, &event(EventKind::Notification))
            .unwrap();

        // then (期待する結果):
        assert_eq!(report, DispatchReport::default());
    }

    #[test]
    fn test_failed_push_does_not_stop_other_deliveries() {
        // テスト項目: 1 つの transport の失敗が他の配信を妨げず、失敗した接続は回収対象になる
        // given (前提条件):
        let fixture = Fixture::new();
        let mut broken = MockConnectionTransport::new();
        broken
            .expect_push()
            .times(1)
            .returning(|_| Err(TransportError::Full));
        broken.expect_close().return_const(());
        let broken_id = fixture.connect_with("mallory", Role::Client, Arc::new(broken));
        let (_a, transport_a) = fixture.connect("alice", Role::Client);
        let (_b, transport_b) = fixture.connect("bob", Role::Client);

        // when (操作):
        let report = fixture
            .dispatcher
            .to_all(&admin(), &event(EventKind::AdminBroadcast))
            .unwrap();
        let second = fixture
            .dispatcher
            .to_all(&admin(), &event(EventKind::AdminBroadcast))
            .unwrap();

        // then (期待する結果):
        assert_eq!(
            report,
            DispatchReport {
                targeted: 3,
                delivered: 2,
                failed: 1
            }
        );
        // 失敗した接続は以降の配信対象から外れる
        assert_eq!(second.targeted, 2);
        assert_eq!(transport_a.kinds().len(), 2);
        assert_eq!(transport_b.kinds().len(), 2);
        let round = fixture.registry.begin_heartbeat_round();
        assert_eq!(round.stale, vec![broken_id]);
    }
}
