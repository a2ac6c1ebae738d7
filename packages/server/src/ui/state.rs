//! Shared application state.

use std::sync::Arc;

use crate::usecase::{
    AdminBroadcastUseCase, AdminQueryUseCase, DisconnectUseCase, IssueTokenUseCase,
    NotifyUseCase, OpenStreamUseCase, SendEventUseCase,
};

/// Use cases shared by every handler
pub struct AppState {
    /// IssueTokenUseCase（ストリームトークン発行）
    pub issue_token_usecase: Arc<IssueTokenUseCase>,
    /// OpenStreamUseCase（SSE ハンドシェイク）
    pub open_stream_usecase: Arc<OpenStreamUseCase>,
    /// SendEventUseCase（クライアントからのイベント送信）
    pub send_event_usecase: Arc<SendEventUseCase>,
    /// DisconnectUseCase（強制切断）
    pub disconnect_usecase: Arc<DisconnectUseCase>,
    /// AdminBroadcastUseCase（管理者ブロードキャスト）
    pub admin_broadcast_usecase: Arc<AdminBroadcastUseCase>,
    /// NotifyUseCase（ドメイン通知）
    pub notify_usecase: Arc<NotifyUseCase>,
    /// AdminQueryUseCase（接続・ルームの参照）
    pub admin_query_usecase: Arc<AdminQueryUseCase>,
}
