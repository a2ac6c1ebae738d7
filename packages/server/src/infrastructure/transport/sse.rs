//! SSE を使った ConnectionTransport 実装
//!
//! ## 設計ノート
//!
//! SSE のレスポンス生成は UI 層（`src/ui/handler/stream.rs`）で行われます。
//! この実装は有界チャネルの送信側を保持し、ディスパッチャからのフレームを
//! `try_send` で渡すだけです（ブロックしない）。
//!
//! - UI 層: `SseReceiver` からフレームを取り出して SSE イベントに変換
//! - Infrastructure 層: フレームの投入と close の通知

use tokio::sync::{mpsc, watch};

use crate::domain::{ConnectionTransport, OutboundFrame, TransportError};

/// Create a bounded transport / receiver pair.
pub fn channel(capacity: usize) -> (SseTransport, SseReceiver) {
    let (sender, frames) = mpsc::channel(capacity.max(1));
    let (closed_tx, closed_rx) = watch::channel(false);
    (
        SseTransport {
            sender,
            closed: closed_tx,
        },
        SseReceiver {
            frames,
            closed: closed_rx,
        },
    )
}

/// Write side held by the registry.
pub struct SseTransport {
    sender: mpsc::Sender<OutboundFrame>,
    closed: watch::Sender<bool>,
}

impl ConnectionTransport for SseTransport {
    fn push(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::Closed);
        }
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Full,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Read side owned by the HTTP response stream.
pub struct SseReceiver {
    frames: mpsc::Receiver<OutboundFrame>,
    closed: watch::Receiver<bool>,
}

impl SseReceiver {
    /// Next frame to write, or `None` once the transport was closed.
    ///
    /// A close takes priority over frames still buffered.
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        if *self.closed.borrow() {
            return None;
        }
        tokio::select! {
            biased;
            _ = self.closed.wait_for(|closed| *closed) => None,
            frame = self.frames.recv() => frame,
        }
    }
}
