//! SSE stream handler.
//!
//! ハンドシェイクに成功すると、接続の `SseReceiver` から取り出したフレームを
//! SSE イベントとして書き出します。`ConnectionGuard` はストリームの状態として
//! 保持され、クライアントが切断してレスポンスが破棄されると接続が削除されます。

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};

use crate::{
    infrastructure::dto::http::StreamQuery,
    ui::state::AppState,
    usecase::OpenedStream,
};

use super::error::ApiError;

pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let OpenedStream {
        connection,
        receiver,
        guard,
    } = state
        .open_stream_usecase
        .execute(&query.token, Some(addr.ip()))
        .inspect_err(|e| tracing::warn!(ip = %addr.ip(), "Stream handshake rejected: {}", e))?;

    tracing::debug!(
        connection_id = %connection.id,
        user_id = %connection.user_id,
        "SSE stream opened"
    );

    let events = stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        let frame = receiver.next_frame().await?;
        let event = Event::default().id(&*frame.event_id).data(&*frame.data);
        Some((Ok(event), (receiver, guard)))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
