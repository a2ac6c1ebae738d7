//! UseCase: 接続・ルーム状態の参照（管理者向け）

use std::sync::Arc;

use crate::{
    domain::{ConnectionFilter, ConnectionSnapshot, Identity, Role, RoomSummary},
    infrastructure::registry::ConnectionRegistry,
};

use super::error::AdminError;

/// Totals for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealtimeStats {
    pub total_connections: usize,
    pub admin_connections: usize,
    pub client_connections: usize,
    pub rooms: usize,
}

pub struct AdminQueryUseCase {
    registry: Arc<ConnectionRegistry>,
}

impl AdminQueryUseCase {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn list_connections(
        &self,
        caller: &Identity,
        role: Option<Role>,
    ) -> Result<Vec<ConnectionSnapshot>, AdminError> {
        require_admin(caller)?;
        Ok(self.registry.list(ConnectionFilter { role }))
    }

    pub fn list_rooms(&self, caller: &Identity) -> Result<Vec<RoomSummary>, AdminError> {
        require_admin(caller)?;
        Ok(self.registry.list_rooms())
    }

    pub fn stats(&self, caller: &Identity) -> Result<RealtimeStats, AdminError> {
        require_admin(caller)?;
        Ok(RealtimeStats {
            total_connections: self.registry.count(),
            admin_connections: self.registry.count_by_role(Role::Admin),
            client_connections: self.registry.count_by_role(Role::Client),
            rooms: self.registry.room_count(),
        })
    }
}

fn require_admin(caller: &Identity) -> Result<(), AdminError> {
    if caller.is_admin() {
        Ok(())
    } else {
        Err(AdminError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use switchboard_shared::time::FixedClock;

    use super::*;
    use crate::{
        domain::{ConnectionIdFactory, ConnectionTransport, RoomName, UserId},
        infrastructure::{registry::Registration, transport},
    };

    fn register(registry: &ConnectionRegistry, user: &str, role: Role) -> crate::domain::ConnectionId {
        let id = ConnectionIdFactory::new().generate();
        let (sse, _receiver) = transport::channel(4);
        let transport: Arc<dyn ConnectionTransport> = Arc::new(sse);
        registry
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

    #[test]
    fn test_stats_and_listing() {
        // テスト項目: 統計と一覧が登録状況を反映する
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(FixedClock::new(0)), 300_000));
        let usecase = AdminQueryUseCase::new(registry.clone());
        let alice = register(&registry, "alice", Role::Client);
        register(&registry, "bob", Role::Client);
        register(&registry, "root", Role::Admin);
        registry.join(&alice, &RoomName::try_from("project-42").unwrap()).unwrap();
        let admin = Identity::new(UserId::try_from("root").unwrap(), Role::Admin);

        // when (操作):
        let stats = usecase.stats(&admin).unwrap();
        let clients = usecase.list_connections(&admin, Some(Role::Client)).unwrap();
        let rooms = usecase.list_rooms(&admin).unwrap();

        // then (期待する結果):
        assert_eq!(
            stats,
            RealtimeStats {
                total_connections: 3,
                admin_connections: 1,
                client_connections: 2,
                rooms: 1,
            }
        );
        assert_eq!(clients.len(), 2);
        assert_eq!(rooms[0].member_count, 1);
    }

    #[test]
    fn test_queries_require_admin() {
        // テスト項目: client ロールは参照できない
        // given (前提条件):
        let registry = Arc::new(ConnectionRegistry::new(Arc::new(FixedClock::new(0)), 300_000));
        let usecase = AdminQueryUseCase::new(registry);
        let caller = Identity::new(UserId::try_from("alice").unwrap(), Role::Client);

        // when (操作):
        let result = usecase.stats(&caller);

        // then (期待する結果):
        assert!(matches!(result, Err(AdminError::Forbidden)));
    }
}
