//! UseCase: 接続の強制切断
//!
//! 登録・ルーム・transport を 1 回の呼び出しで片付けます。
//! 既に存在しない接続に対しても成功（冪等）します。

use std::sync::Arc;

use crate::{
    domain::{ConnectionId, Identity},
    infrastructure::registry::ConnectionRegistry,
};

use super::error::AdminError;

pub struct DisconnectUseCase {
    registry: Arc<ConnectionRegistry>,
}

impl DisconnectUseCase {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Returns whether a live connection was removed.
    pub fn execute(&self, caller: &Identity, connection_id: &ConnectionId) -> Result<bool, AdminError> {
        if !caller.is_admin() {
            return Err(AdminError::Forbidden);
        }
        let removed = self.registry.remove(connection_id).is_some();
        if removed {
            tracing::info!(
                connection_id = %connection_id,
                by = %caller.user_id,
                "connection disconnected by admin"
            );
        }
        Ok(removed)
    }
}
