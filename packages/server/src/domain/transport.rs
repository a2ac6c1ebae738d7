//! Transport seam
//!
//! 各接続への書き込み口を抽象化する trait。
//! ディスパッチャとハートビートはこの trait だけに依存し、
//! SSE の具体的な実装は Infrastructure 層が提供します。

use std::sync::Arc;

use super::error::TransportError;

/// A serialized event, shared between all recipients of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub event_id: Arc<str>,
    pub kind: Arc<str>,
    pub data: Arc<str>,
}

/// Write side of one connection's push stream.
///
/// `push` must not block: implementations hand the frame to a buffer and
/// report `TransportError::Full` instead of waiting.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionTransport: Send + Sync {
    fn push(&self, frame: OutboundFrame) -> Result<(), TransportError>;

    /// Close the stream. Idempotent.
    fn close(&self);
}
