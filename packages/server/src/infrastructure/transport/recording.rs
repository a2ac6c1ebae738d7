//! In-memory transport for unit tests.

use std::sync::Mutex;

use serde_json::Value;

use crate::domain::{ConnectionTransport, OutboundFrame, TransportError};

/// Records every frame it receives.
#[derive(Default)]
pub struct RecordingTransport {
    frames: Mutex<Vec<OutboundFrame>>,
}

impl RecordingTransport {
    /// 受信したフレームの種別 (受信順)
    pub fn kinds(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|frame| frame.kind.to_string())
            .collect()
    }

    /// 最後に受信したエンベロープ
    pub fn last_data(&self) -> Option<Value> {
        self.frames
            .lock()
            .unwrap()
            .last()
            .and_then(|frame| serde_json::from_str(&frame.data).ok())
    }

    /// 受信したエンベロープの `payload` (受信順)
    pub fn payloads(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter_map(|frame| serde_json::from_str::<Value>(&frame.data).ok())
            .map(|envelope| envelope["payload"].clone())
            .collect()
    }
}

impl ConnectionTransport for RecordingTransport {
    fn push(&self, frame: OutboundFrame) -> Result<(), TransportError> {
        self.frames.lock().unwrap().push(frame);
        Ok(())
    }

    fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, EventKind, Timestamp};
    use serde_json::json;

    #[test]
    fn test_records_frames_in_order() {
        // テスト項目: 受信したフレームが順番どおりに記録される
        // given (前提条件):
        let transport = RecordingTransport::default();
        let first = Event::new(EventKind::RoomJoined, json!({ "n": 1 }), Timestamp::new(1));
        let second = Event::new(EventKind::RoomLeft, json!({ "n": 2 }), Timestamp::new(2));

        // when (操作):
        transport.push(OutboundFrame::from_event(&first).unwrap()).unwrap();
        transport.push(OutboundFrame::from_event(&second).unwrap()).unwrap();

        // then (期待する結果):
        assert_eq!(transport.kinds(), vec!["room_joined".to_string(), "room_left".to_string()]);
        assert_eq!(transport.payloads(), vec![json!({ "n": 1 }), json!({ "n": 2 })]);
        assert_eq!(transport.last_data().unwrap()["payload"], json!({ "n": 2 }));
    }
}
