//! UseCase: ストリームのハンドシェイク
//!
//! トークンを検証し、接続をレジストリに登録して最初の `connection_status` を送ります。
//! 検証や登録に失敗した場合は何の状態も作りません。
//!
//! 返される `ConnectionGuard` はストリームの寿命に紐付けられ、
//! 破棄されたとき（クライアントの切断）に接続を削除します。

use std::{net::IpAddr, sync::Arc};

use serde_json::json;
use switchboard_shared::time::Clock;

use crate::{
    config::RealtimeConfig,
    domain::{ConnectionId, ConnectionSnapshot, Event, EventKind, Sender, Timestamp},
    infrastructure::{
        dispatcher::BroadcastDispatcher,
        registry::{ConnectionRegistry, Registration},
        token::TokenIssuer,
        transport::{self, SseReceiver},
    },
};

use super::error::OpenStreamError;

/// Removes the connection when the stream that owns it is dropped.
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    connection_id: ConnectionId,
}

impl ConnectionGuard {
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.registry.remove(&self.connection_id).is_some() {
            tracing::debug!(connection_id = %self.connection_id, "stream closed by peer");
        }
    }
}

pub struct OpenedStream {
    pub connection: ConnectionSnapshot,
    pub receiver: SseReceiver,
    pub guard: ConnectionGuard,
}

pub struct OpenStreamUseCase {
    issuer: Arc<TokenIssuer>,
    registry: Arc<ConnectionRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
    clock: Arc<dyn Clock>,
    config: RealtimeConfig,
}

impl OpenStreamUseCase {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        registry: Arc<ConnectionRegistry>,
        dispatcher: Arc<BroadcastDispatcher>,
        clock: Arc<dyn Clock>,
        config: RealtimeConfig,
    ) -> Self {
        Self {
            issuer,
            registry,
            dispatcher,
            clock,
            config,
        }
    }

    pub fn execute(
        &self,
        token: &str,
        ip_address: Option<IpAddr>,
    ) -> Result<OpenedStream, OpenStreamError> {
        // 1. トークンの検証
        let claims = self.issuer.verify(token)?;

        // 2. 接続の登録（同じ connection id の再登録はリプレイ）
        let (sse, receiver) = transport::channel(self.config.outbound_buffer);
        let connection = self
            .registry
            .register(Registration {
                connection_id: claims.connection_id,
                user_id: claims.user_id,
                role: claims.role,
                ip_address,
                transport: Arc::new(sse),
            })?;

        let guard = ConnectionGuard {
            registry: self.registry.clone(),
            connection_id: connection.id.clone(),
        };

        // 3. 最初のイベントとして接続状態を送信
        let status = Event::new(
            EventKind::ConnectionStatus,
            json!({
                "status": "connected",
                "connectionId": connection.id.as_str(),
                "role": connection.role,
                "heartbeatIntervalSecs": self.config.heartbeat_interval.as_secs(),
            }),
            Timestamp::new(self.clock.now_millis()),
        )
        .with_user(connection.user_id.clone());
        self.dispatcher
            .to_connection(&Sender::System, &connection.id, &status)?;

        Ok(OpenedStream {
            connection,
            receiver,
            guard,
        })
    }
}

#[cfg(test)]
mod tests {
    use switchboard_shared::time::FixedClock;

    use super::*;
    use crate::domain::{Role, TokenError, UserId};

    struct Fixture {
        usecase: OpenStreamUseCase,
        issuer: Arc<TokenIssuer>,
        registry: Arc<ConnectionRegistry>,
        clock: Arc<FixedClock>,
    }

    fn create_fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(1_700_000_000_000));
        let config = RealtimeConfig::new("secret");
        let issuer = Arc::new(TokenIssuer::new(b"secret", config.token_ttl_secs, clock.clone()));
        let registry = Arc::new(ConnectionRegistry::new(
            clock.clone(),
            config.retired_retention_millis(),
        ));
        let dispatcher = Arc::new(BroadcastDispatcher::new(registry.clone()));
        Fixture {
            usecase: OpenStreamUseCase::new(
                issuer.clone(),
                registry.clone(),
                dispatcher,
                clock.clone(),
                config,
            ),
            issuer,
            registry,
            clock,
        }
    }

    fn alice() -> UserId {
        UserId::try_from("alice").unwrap()
    }

    #[tokio::test]
    async fn test_handshake_registers_and_sends_connection_status() {
        // テスト項目: ハンドシェイクで接続が登録され、最初に connection_status が届く
        // given (前提条件):
        let fixture = create_fixture();
        let issued = fixture.issuer.issue(&alice(), Role::Client).unwrap();

        // when (操作):
        let mut opened = fixture.usecase.execute(&issued.token, None).unwrap();

        // then (期待する結果):
        assert_eq!(opened.connection.id, issued.connection_id);
        assert_eq!(opened.guard.connection_id(), &issued.connection_id);
        assert!(fixture.registry.get(&issued.connection_id).is_some());
        let first = opened.receiver.next_frame().await.unwrap();
        assert_eq!(&*first.kind, "connection_status");
        assert!(first.data.contains(issued.connection_id.as_str()));
    }

    #[tokio::test]
    async fn test_replayed_token_is_rejected() {
        // テスト項目: 使用済みトークンでのハンドシェイクは拒否され、既存の接続は影響を受けない
        // given (前提条件):
        let fixture = create_fixture();
        let issued = fixture.issuer.issue(&alice(), Role::Client).unwrap();
        let _opened = fixture.usecase.execute(&issued.token, None).unwrap();

        // when (操作):
        let result = fixture.usecase.execute(&issued.token, None);

        // then (期待する結果):
        assert!(matches!(result, Err(OpenStreamError::Replayed(id)) if id == issued.connection_id));
        assert_eq!(fixture.registry.count(), 1);
    }

    #[tokio::test]
    async fn test_token_cannot_be_reused_after_disconnect() {
        // テスト項目: 切断後も同じトークンでは再接続できない
        // given (前提条件):
        let fixture = create_fixture();
        let issued = fixture.issuer.issue(&alice(), Role::Client).unwrap();
        let opened = fixture.usecase.execute(&issued.token, None).unwrap();

        // when (操作):
        drop(opened);
        let result = fixture.usecase.execute(&issued.token, None);

        // then (期待する結果):
        assert!(matches!(result, Err(OpenStreamError::Replayed(_))));
        assert_eq!(fixture.registry.count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_creates_no_state() {
        // テスト項目: 期限切れトークンでは何の状態も作られない
        // given (前提条件):
        let fixture = create_fixture();
        let issued = fixture.issuer.issue(&alice(), Role::Client).unwrap();
        fixture.clock.advance(300_000);

        // when (操作):
        let result = fixture.usecase.execute(&issued.token, None);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(OpenStreamError::InvalidToken(TokenError::Expired))
        ));
        assert_eq!(fixture.registry.count(), 0);
    }

    #[tokio::test]
    async fn test_dropping_guard_removes_connection() {
        // テスト項目: ストリームの破棄（ガードの drop）で接続が削除される
        // given (前提条件):
        let fixture = create_fixture();
        let issued = fixture.issuer.issue(&alice(), Role::Client).unwrap();
        let opened = fixture.usecase.execute(&issued.token, None).unwrap();

        // when (操作):
        drop(opened.guard);

        // then (期待する結果):
        assert!(fixture.registry.get(&issued.connection_id).is_none());
    }
}
