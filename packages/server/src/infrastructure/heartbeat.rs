//! Heartbeat monitor
//!
//! 一定間隔で全接続に `heartbeat` を送り、前回の ping 以降に活動のなかった接続を
//! 回収します。接続は 1 回の応答期限切れでちょうど回収されます。
//!
//! ```text
//! ALIVE --(ping 送信)--> NOT ALIVE --(次の tick までに活動なし)--> RECLAIMED
//!                            |
//!                            +--(活動あり: touch)--> ALIVE
//! ```

use std::{sync::Arc, time::Duration};

use serde_json::json;
use switchboard_shared::time::Clock;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{
    domain::{Event, EventKind, OutboundFrame, Timestamp},
    infrastructure::registry::ConnectionRegistry,
};

/// Default interval between heartbeat rounds.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub pinged: usize,
    pub reclaimed: usize,
}

pub struct HeartbeatMonitor {
    registry: Arc<ConnectionRegistry>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl HeartbeatMonitor {
    pub fn new(registry: Arc<ConnectionRegistry>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            registry,
            clock,
            interval,
        }
    }

    /// Run one heartbeat round.
    pub fn sweep(&self) -> SweepReport {
        let round = self.registry.begin_heartbeat_round();

        let reclaimed = round
            .stale
            .iter()
            .filter(|connection_id| self.registry.reclaim_if_stale(connection_id).is_some())
            .count();

        let mut report = SweepReport {
            pinged: 0,
            reclaimed,
        };
        if round.pings.is_empty() {
            return report;
        }

        let event = Event::new(
            EventKind::Heartbeat,
            json!({ "intervalSecs": self.interval.as_secs() }),
            Timestamp::new(self.clock.now_millis()),
        );
        let frame = match OutboundFrame::from_event(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::error!("Failed to serialize heartbeat: {}", e);
                return report;
            }
        };

        for (connection_id, transport) in round.pings {
            match transport.push(frame.clone()) {
                Ok(()) => report.pinged += 1,
                Err(e) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        error = %e,
                        "heartbeat push failed"
                    );
                    self.registry.mark_failed(&connection_id);
                }
            }
        }

        if report.reclaimed > 0 {
            tracing::info!(
                reclaimed = report.reclaimed,
                pinged = report.pinged,
                "heartbeat sweep reclaimed connections"
            );
        } else {
            tracing::debug!(pinged = report.pinged, "heartbeat sweep");
        }
        report
    }

    /// Spawn the periodic sweep on the tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // 最初の tick は即時に完了するので読み捨てる
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.sweep();
            }
        })
    }
}
