//! Client session state machine.
//!
//! `ClientSession` performs no I/O. Every input returns the [`Command`]s the
//! driver has to execute, so reconnect, heartbeat and queueing rules can be
//! exercised without a transport.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use serde_json::Value;
use switchboard_server::infrastructure::dto::{event::EventEnvelope, http::SendEventRequest};

use crate::domain::{should_attempt_reconnect, should_exit_immediately};
use crate::error::{ClientError, SessionError};

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);
/// サーバー側の heartbeat 間隔 (30 秒) より短くする
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
pub const DEFAULT_HIDDEN_QUEUE_CAPACITY: usize = 256;
pub const DEFAULT_DEDUP_WINDOW: usize = 128;

const HEARTBEAT_TYPE: &str = "heartbeat";
const PONG_TYPE: &str = "pong";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    /// Stream lost, retry scheduled
    Reconnecting,
    /// Retries used up or session rejected; only `restart` leaves this state
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    Reconnect,
    Heartbeat,
}

/// Host visibility (tab / window shown or hidden)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Side effects requested by the session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Mint a fresh stream token and open the stream
    OpenStream,
    /// One-shot timer; starting a running timer replaces it
    StartTimer(Timer, Duration),
    CancelTimer(Timer),
    SendEvent(SendEventRequest),
    SendHeartbeat,
    CloseStream,
    Deliver(EventEnvelope),
    ReportError(SessionError),
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Consecutive failed attempts before giving up
    pub max_reconnect_attempts: u32,
    pub reconnect_interval: Duration,
    pub heartbeat_interval: Duration,
    pub hidden_queue_capacity: usize,
    pub dedup_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            hidden_queue_capacity: DEFAULT_HIDDEN_QUEUE_CAPACITY,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

pub struct ClientSession {
    config: SessionConfig,
    state: SessionState,
    visibility: Visibility,
    /// 連続失敗回数 (接続成功でリセット)
    failures: u32,
    outbox: VecDeque<SendEventRequest>,
    seen_order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ClientSession {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            state: SessionState::Disconnected,
            visibility: Visibility::Visible,
            failures: 0,
            outbox: VecDeque::new(),
            seen_order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn queued(&self) -> usize {
        self.outbox.len()
    }

    pub fn connect(&mut self) -> Vec<Command> {
        if self.state != SessionState::Disconnected {
            return Vec::new();
        }
        self.state = SessionState::Connecting;
        vec![Command::OpenStream]
    }

    /// The stream opened (handshake accepted).
    pub fn on_open(&mut self) -> Vec<Command> {
        if self.state != SessionState::Connecting {
            // disconnect() されたあとに開いたストリーム
            return vec![Command::CloseStream];
        }

        self.state = SessionState::Connected;
        self.failures = 0;
        tracing::info!("Session connected");

        let mut commands = vec![Command::StartTimer(
            Timer::Heartbeat,
            self.config.heartbeat_interval,
        )];
        if self.visibility == Visibility::Visible {
            commands.extend(self.drain_outbox());
        }
        commands
    }

    pub fn on_message(&mut self, envelope: EventEnvelope) -> Vec<Command> {
        if self.state != SessionState::Connected {
            return Vec::new();
        }
        if !self.remember(&envelope.id) {
            tracing::debug!("Dropping duplicate event: {}", envelope.id);
            return Vec::new();
        }

        if envelope.r#type == HEARTBEAT_TYPE {
            // server ping は表示せず pong を返す
            return vec![Command::SendEvent(SendEventRequest {
                r#type: PONG_TYPE.to_string(),
                payload: Value::Null,
                room_id: None,
            })];
        }

        vec![Command::Deliver(envelope)]
    }

    /// The stream failed to open, errored, or ended.
    pub fn on_transport_error(&mut self, error: &ClientError) -> Vec<Command> {
        if !matches!(
            self.state,
            SessionState::Connecting | SessionState::Connected
        ) {
            return Vec::new();
        }

        let mut commands = vec![Command::CancelTimer(Timer::Heartbeat), Command::CloseStream];
        self.failures += 1;

        if should_exit_immediately(error) {
            tracing::error!("Session rejected: {}", error);
            self.state = SessionState::Exhausted;
            commands.push(Command::ReportError(SessionError::Rejected(
                error.to_string(),
            )));
        } else if should_attempt_reconnect(error, self.failures, self.config.max_reconnect_attempts)
        {
            tracing::warn!(
                "Connection lost: {} (attempt {}/{})",
                error,
                self.failures,
                self.config.max_reconnect_attempts
            );
            self.state = SessionState::Reconnecting;
            commands.push(Command::StartTimer(
                Timer::Reconnect,
                self.config.reconnect_interval,
            ));
        } else {
            tracing::error!(
                "Failed to reconnect after {} attempts. Giving up.",
                self.failures
            );
            self.state = SessionState::Exhausted;
            commands.push(Command::ReportError(SessionError::ReconnectExhausted {
                attempts: self.failures,
            }));
        }
        commands
    }

    pub fn on_timer(&mut self, timer: Timer) -> Vec<Command> {
        match (timer, self.state) {
            (Timer::Reconnect, SessionState::Reconnecting) => {
                tracing::info!("Reconnecting (attempt {})", self.failures + 1);
                self.state = SessionState::Connecting;
                vec![Command::OpenStream]
            }
            (Timer::Heartbeat, SessionState::Connected) => vec![
                Command::SendHeartbeat,
                Command::StartTimer(Timer::Heartbeat, self.config.heartbeat_interval),
            ],
            // キャンセル済みタイマーの発火
            _ => Vec::new(),
        }
    }

    /// Send an event, or queue it while the host is hidden.
    pub fn send(&mut self, request: SendEventRequest) -> Result<Vec<Command>, SessionError> {
        if self.visibility == Visibility::Hidden {
            self.enqueue(request);
            return Ok(Vec::new());
        }

        match self.state {
            SessionState::Connected => Ok(vec![Command::SendEvent(request)]),
            SessionState::Exhausted => Err(SessionError::ReconnectExhausted {
                attempts: self.failures,
            }),
            _ => Err(SessionError::NotConnected),
        }
    }

    pub fn set_visibility(&mut self, visibility: Visibility) -> Vec<Command> {
        self.visibility = visibility;
        if visibility == Visibility::Visible && self.state == SessionState::Connected {
            self.drain_outbox()
        } else {
            Vec::new()
        }
    }

    /// Explicit disconnect. No-op once exhausted.
    pub fn disconnect(&mut self) -> Vec<Command> {
        match self.state {
            SessionState::Disconnected | SessionState::Exhausted => Vec::new(),
            _ => {
                self.state = SessionState::Disconnected;
                vec![
                    Command::CancelTimer(Timer::Heartbeat),
                    Command::CancelTimer(Timer::Reconnect),
                    Command::CloseStream,
                ]
            }
        }
    }

    /// Start over with a fresh retry budget.
    pub fn restart(&mut self) -> Vec<Command> {
        tracing::info!("Restarting session");
        self.failures = 0;
        self.state = SessionState::Connecting;
        vec![
            Command::CancelTimer(Timer::Heartbeat),
            Command::CancelTimer(Timer::Reconnect),
            Command::CloseStream,
            Command::OpenStream,
        ]
    }

    fn enqueue(&mut self, request: SendEventRequest) {
        if self.outbox.len() >= self.config.hidden_queue_capacity {
            if let Some(dropped) = self.outbox.pop_front() {
                tracing::warn!("Outgoing queue full, dropping oldest event: {}", dropped.r#type);
            }
        }
        self.outbox.push_back(request);
    }

    fn drain_outbox(&mut self) -> Vec<Command> {
        self.outbox.drain(..).map(Command::SendEvent).collect()
    }

    /// 直近 `dedup_window` 件の event id を記録し、初見なら true
    fn remember(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.seen_order.push_back(id.to_string());
        while self.seen_order.len() > self.config.dedup_window {
            if let Some(oldest) = self.seen_order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn connection_lost() -> ClientError {
        ClientError::Connection("stream closed".to_string())
    }

    fn event(kind: &str, text: &str) -> SendEventRequest {
        SendEventRequest {
            r#type: kind.to_string(),
            payload: json!({ "text": text }),
            room_id: Some("lobby".to_string()),
        }
    }

    fn envelope(id: &str, kind: &str) -> EventEnvelope {
        EventEnvelope {
            r#type: kind.to_string(),
            payload: json!({}),
            timestamp: 1_000,
            id: id.to_string(),
            user_id: None,
            room_id: None,
        }
    }

    fn connected_session(config: SessionConfig) -> ClientSession {
        let mut session = ClientSession::new(config);
        session.connect();
        session.on_open();
        session
    }

    #[test]
    fn test_connect_then_open_starts_heartbeat() {
        // テスト項目: 接続が開くと Connected になり heartbeat タイマーが開始される
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig::default());

        // when (操作):
        let connect = session.connect();
        let open = session.on_open();

        // then (期待する結果):
        assert_eq!(connect, vec![Command::OpenStream]);
        assert_eq!(
            open,
            vec![Command::StartTimer(Timer::Heartbeat, DEFAULT_HEARTBEAT_INTERVAL)]
        );
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_retries_exhaust_into_terminal_state() {
        // テスト項目: 連続失敗が上限に達すると Exhausted になり、以降は接続を試みない
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig {
            max_reconnect_attempts: 3,
            ..SessionConfig::default()
        });
        let mut opens = session.connect().len();

        // when (操作):
        let mut last = Vec::new();
        for _ in 0..3 {
            last = session.on_transport_error(&connection_lost());
            opens += session
                .on_timer(Timer::Reconnect)
                .iter()
                .filter(|c| **c == Command::OpenStream)
                .count();
        }

        // then (期待する結果):
        assert_eq!(opens, 3);
        assert_eq!(session.state(), SessionState::Exhausted);
        assert!(last.contains(&Command::ReportError(
            SessionError::ReconnectExhausted { attempts: 3 }
        )));
        assert!(!last.iter().any(|c| matches!(c, Command::StartTimer(..))));
        assert!(session.connect().is_empty());
        assert!(session.on_timer(Timer::Reconnect).is_empty());
    }

    #[test]
    fn test_transport_error_schedules_fixed_interval_retry() {
        // テスト項目: 接続断で heartbeat を止め、一定間隔の再接続タイマーを設定する
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());

        // when (操作):
        let commands = session.on_transport_error(&connection_lost());

        // then (期待する結果):
        assert_eq!(
            commands,
            vec![
                Command::CancelTimer(Timer::Heartbeat),
                Command::CloseStream,
                Command::StartTimer(Timer::Reconnect, DEFAULT_RECONNECT_INTERVAL),
            ]
        );
        assert_eq!(session.state(), SessionState::Reconnecting);
    }

    #[test]
    fn test_unauthorized_is_fatal() {
        // テスト項目: Unauthorized は再接続せず即座に Exhausted になる
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig::default());
        session.connect();

        // when (操作):
        let commands =
            session.on_transport_error(&ClientError::Unauthorized("bad identity".to_string()));

        // then (期待する結果):
        assert_eq!(session.state(), SessionState::Exhausted);
        assert!(commands
            .iter()
            .any(|c| matches!(c, Command::ReportError(SessionError::Rejected(_)))));
        assert!(!commands.iter().any(|c| matches!(c, Command::StartTimer(..))));
    }

    #[test]
    fn test_successful_open_resets_failure_count() {
        // テスト項目: 接続成功で連続失敗回数がリセットされる
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig {
            max_reconnect_attempts: 2,
            ..SessionConfig::default()
        });
        session.connect();
        session.on_transport_error(&connection_lost());
        session.on_timer(Timer::Reconnect);
        session.on_open();

        // when (操作):
        session.on_transport_error(&connection_lost());

        // then (期待する結果):
        assert_eq!(session.failures(), 1);
        assert_eq!(session.state(), SessionState::Reconnecting);
    }

    #[test]
    fn test_heartbeat_timer_rearms_while_connected() {
        // テスト項目: heartbeat タイマー発火で heartbeat を送り、タイマーを再設定する
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());

        // when (操作):
        let commands = session.on_timer(Timer::Heartbeat);

        // then (期待する結果):
        assert_eq!(
            commands,
            vec![
                Command::SendHeartbeat,
                Command::StartTimer(Timer::Heartbeat, DEFAULT_HEARTBEAT_INTERVAL),
            ]
        );
    }

    #[test]
    fn test_disconnect_cancels_timers_and_ignores_late_heartbeat() {
        // テスト項目: 明示的な切断で全タイマーを止め、遅れて発火した heartbeat は無視される
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());

        // when (操作):
        let commands = session.disconnect();
        let late = session.on_timer(Timer::Heartbeat);

        // then (期待する結果):
        assert!(commands.contains(&Command::CancelTimer(Timer::Heartbeat)));
        assert!(commands.contains(&Command::CancelTimer(Timer::Reconnect)));
        assert!(commands.contains(&Command::CloseStream));
        assert!(late.is_empty());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_open_after_disconnect_closes_stream() {
        // テスト項目: 切断後に開いたストリームは即座に閉じられる
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig::default());
        session.connect();
        session.disconnect();

        // when (操作):
        let commands = session.on_open();

        // then (期待する結果):
        assert_eq!(commands, vec![Command::CloseStream]);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_hidden_queue_flushes_in_order_on_visible() {
        // テスト項目: 非表示中の送信はキューに溜まり、表示復帰時に順番どおり送信されキューが空になる
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());
        session.set_visibility(Visibility::Hidden);
        for text in ["first", "second", "third"] {
            let sent = session.send(event("room_message", text));
            assert_eq!(sent, Ok(Vec::new()));
        }

        // when (操作):
        let commands = session.set_visibility(Visibility::Visible);

        // then (期待する結果):
        assert_eq!(
            commands,
            vec![
                Command::SendEvent(event("room_message", "first")),
                Command::SendEvent(event("room_message", "second")),
                Command::SendEvent(event("room_message", "third")),
            ]
        );
        assert_eq!(session.queued(), 0);
    }

    #[test]
    fn test_queue_waits_for_connection_when_visible_again() {
        // テスト項目: 再接続中に表示復帰した場合、キューは接続成功時に送信される
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());
        session.set_visibility(Visibility::Hidden);
        let _ = session.send(event("room_message", "queued"));
        session.on_transport_error(&connection_lost());

        // when (操作):
        let on_visible = session.set_visibility(Visibility::Visible);
        session.on_timer(Timer::Reconnect);
        let on_open = session.on_open();

        // then (期待する結果):
        assert!(on_visible.is_empty());
        assert!(on_open.contains(&Command::SendEvent(event("room_message", "queued"))));
        assert_eq!(session.queued(), 0);
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        // テスト項目: キューが上限に達すると最も古いイベントが捨てられる
        // given (前提条件):
        let mut session = connected_session(SessionConfig {
            hidden_queue_capacity: 2,
            ..SessionConfig::default()
        });
        session.set_visibility(Visibility::Hidden);

        // when (操作):
        for text in ["a", "b", "c"] {
            let _ = session.send(event("room_message", text));
        }
        let commands = session.set_visibility(Visibility::Visible);

        // then (期待する結果):
        assert_eq!(
            commands,
            vec![
                Command::SendEvent(event("room_message", "b")),
                Command::SendEvent(event("room_message", "c")),
            ]
        );
    }

    #[test]
    fn test_send_without_connection_is_rejected() {
        // テスト項目: 表示中かつ未接続で送信するとエラーになる
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig::default());
        session.connect();

        // when (操作):
        let result = session.send(event("room_message", "hello"));

        // then (期待する結果):
        assert_eq!(result, Err(SessionError::NotConnected));
    }

    #[test]
    fn test_duplicate_events_are_delivered_once() {
        // テスト項目: 同じ id のイベントは一度だけ配信される
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());

        // when (操作):
        let first = session.on_message(envelope("evt-1", "room_message"));
        let second = session.on_message(envelope("evt-1", "room_message"));

        // then (期待する結果):
        assert_eq!(first, vec![Command::Deliver(envelope("evt-1", "room_message"))]);
        assert!(second.is_empty());
    }

    #[test]
    fn test_dedup_window_forgets_old_ids() {
        // テスト項目: 記録件数を超えた古い id は忘れられる
        // given (前提条件):
        let mut session = connected_session(SessionConfig {
            dedup_window: 2,
            ..SessionConfig::default()
        });
        for id in ["evt-1", "evt-2", "evt-3"] {
            session.on_message(envelope(id, "notification"));
        }

        // when (操作):
        let replayed = session.on_message(envelope("evt-1", "notification"));

        // then (期待する結果):
        assert_eq!(replayed.len(), 1);
    }

    #[test]
    fn test_server_heartbeat_is_answered_not_delivered() {
        // テスト項目: サーバーの heartbeat は表示されず pong が返される
        // given (前提条件):
        let mut session = connected_session(SessionConfig::default());

        // when (操作):
        let commands = session.on_message(envelope("evt-hb", HEARTBEAT_TYPE));

        // then (期待する結果):
        assert_eq!(commands.len(), 1);
        assert!(matches!(
            &commands[0],
            Command::SendEvent(request) if request.r#type == PONG_TYPE
        ));
    }

    #[test]
    fn test_restart_leaves_exhausted() {
        // テスト項目: restart で Exhausted から抜け、新しい再試行枠で接続を開始する
        // given (前提条件):
        let mut session = ClientSession::new(SessionConfig {
            max_reconnect_attempts: 1,
            ..SessionConfig::default()
        });
        session.connect();
        session.on_transport_error(&connection_lost());
        assert_eq!(session.state(), SessionState::Exhausted);

        // when (操作):
        let commands = session.restart();

        // then (期待する結果):
        assert_eq!(commands.last(), Some(&Command::OpenStream));
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(session.failures(), 0);
    }
}
