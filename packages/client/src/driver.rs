//! Async driver for `ClientSession`.
//!
//! All session callbacks run on the driver task. The driver owns the stream
//! and both timers, so dropping them on teardown cancels everything.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use switchboard_server::infrastructure::dto::{event::EventEnvelope, http::SendEventRequest};
use tokio::sync::mpsc;
use tokio::time::Sleep;

use crate::{
    api::{EventStream, PortalApi},
    domain::is_transport_failure,
    error::{ClientError, SessionError},
    session::{ClientSession, Command, SessionState, Timer, Visibility},
};

/// Requests from the host application
#[derive(Debug, Clone, PartialEq)]
pub enum DriverInput {
    Send(SendEventRequest),
    SetVisibility(Visibility),
    Disconnect,
    Restart,
    Quit,
}

/// Notifications to the host application
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutput {
    Event(EventEnvelope),
    StateChanged(SessionState),
    Error(SessionError),
    /// The server refused a single event; the stream stays open
    Rejected(ClientError),
}

type TimerSlot = Option<Pin<Box<Sleep>>>;

pub struct SessionDriver {
    api: Arc<dyn PortalApi>,
    session: ClientSession,
    outputs: mpsc::UnboundedSender<SessionOutput>,
    stream: Option<EventStream>,
    connection_id: Option<String>,
    reconnect_timer: TimerSlot,
    heartbeat_timer: TimerSlot,
    reported_state: SessionState,
}

impl SessionDriver {
    pub fn new(
        api: Arc<dyn PortalApi>,
        session: ClientSession,
        outputs: mpsc::UnboundedSender<SessionOutput>,
    ) -> Self {
        let reported_state = session.state();
        Self {
            api,
            session,
            outputs,
            stream: None,
            connection_id: None,
            reconnect_timer: None,
            heartbeat_timer: None,
            reported_state,
        }
    }

    /// Connect and process inputs until `Quit` or the input channel closes.
    ///
    /// Returns the final session state.
    pub async fn run(mut self, mut inputs: mpsc::Receiver<DriverInput>) -> SessionState {
        let commands = self.session.connect();
        self.execute(commands).await;

        loop {
            tokio::select! {
                input = inputs.recv() => {
                    let commands = match input {
                        Some(DriverInput::Send(request)) => match self.session.send(request) {
                            Ok(commands) => commands,
                            Err(e) => {
                                self.emit(SessionOutput::Error(e));
                                Vec::new()
                            }
                        },
                        Some(DriverInput::SetVisibility(visibility)) => {
                            self.session.set_visibility(visibility)
                        }
                        Some(DriverInput::Disconnect) => self.session.disconnect(),
                        Some(DriverInput::Restart) => self.session.restart(),
                        Some(DriverInput::Quit) | None => {
                            let commands = self.session.disconnect();
                            self.execute(commands).await;
                            break;
                        }
                    };
                    self.execute(commands).await;
                }
                item = next_envelope(&mut self.stream) => {
                    let commands = match item {
                        Some(Ok(envelope)) => self.session.on_message(envelope),
                        Some(Err(e)) => self.session.on_transport_error(&e),
                        None => {
                            self.stream = None;
                            self.session.on_transport_error(&ClientError::Connection(
                                "Stream closed by server".to_string(),
                            ))
                        }
                    };
                    self.execute(commands).await;
                }
                _ = fire(&mut self.reconnect_timer) => {
                    self.reconnect_timer = None;
                    let commands = self.session.on_timer(Timer::Reconnect);
                    self.execute(commands).await;
                }
                _ = fire(&mut self.heartbeat_timer) => {
                    self.heartbeat_timer = None;
                    let commands = self.session.on_timer(Timer::Heartbeat);
                    self.execute(commands).await;
                }
            }
        }

        tracing::info!("Session driver stopped");
        self.session.state()
    }

    async fn execute(&mut self, commands: Vec<Command>) {
        let mut pending: VecDeque<Command> = commands.into();

        while let Some(command) = pending.pop_front() {
            match command {
                Command::OpenStream => pending.extend(self.open_stream().await),
                Command::StartTimer(timer, after) => {
                    *self.timer_slot(timer) = Some(Box::pin(tokio::time::sleep(after)));
                }
                Command::CancelTimer(timer) => *self.timer_slot(timer) = None,
                Command::SendEvent(request) => pending.extend(self.send(request).await),
                Command::SendHeartbeat => pending.extend(self.send(heartbeat_request()).await),
                Command::CloseStream => {
                    self.stream = None;
                    self.connection_id = None;
                }
                Command::Deliver(envelope) => self.emit(SessionOutput::Event(envelope)),
                Command::ReportError(error) => self.emit(SessionOutput::Error(error)),
            }
        }

        let state = self.session.state();
        if state != self.reported_state {
            self.reported_state = state;
            self.emit(SessionOutput::StateChanged(state));
        }
    }

    /// 接続試行ごとに新しいトークンを発行する
    async fn open_stream(&mut self) -> Vec<Command> {
        self.stream = None;
        let api = Arc::clone(&self.api);

        let opened = async {
            let ticket = api.issue_token().await?;
            let stream = api.open_stream(&ticket.token).await?;
            Ok::<_, ClientError>((ticket.connection_id, stream))
        }
        .await;

        match opened {
            Ok((connection_id, stream)) => {
                tracing::info!("Stream opened as connection {}", connection_id);
                self.connection_id = Some(connection_id);
                self.stream = Some(stream);
                self.session.on_open()
            }
            Err(e) => self.session.on_transport_error(&e),
        }
    }

    async fn send(&mut self, request: SendEventRequest) -> Vec<Command> {
        let Some(connection_id) = self.connection_id.clone() else {
            tracing::debug!("No open connection, dropping event: {}", request.r#type);
            return Vec::new();
        };

        match self.api.send_event(&connection_id, &request).await {
            Ok(()) => Vec::new(),
            Err(e) if is_transport_failure(&e) => self.session.on_transport_error(&e),
            Err(e) => {
                tracing::warn!("Event '{}' rejected: {}", request.r#type, e);
                self.emit(SessionOutput::Rejected(e));
                Vec::new()
            }
        }
    }

    fn timer_slot(&mut self, timer: Timer) -> &mut TimerSlot {
        match timer {
            Timer::Reconnect => &mut self.reconnect_timer,
            Timer::Heartbeat => &mut self.heartbeat_timer,
        }
    }

    fn emit(&self, output: SessionOutput) {
        if self.outputs.send(output).is_err() {
            tracing::debug!("Session output receiver dropped");
        }
    }
}

fn heartbeat_request() -> SendEventRequest {
    SendEventRequest {
        r#type: "heartbeat".to_string(),
        payload: Value::Null,
        room_id: None,
    }
}

async fn next_envelope(
    stream: &mut Option<EventStream>,
) -> Option<Result<EventEnvelope, ClientError>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn fire(timer: &mut TimerSlot) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::Sequence;
    use serde_json::json;

    use super::*;
    use crate::api::{MockPortalApi, StreamTicket};
    use crate::session::SessionConfig;

    fn ticket() -> StreamTicket {
        StreamTicket {
            token: "token-1".to_string(),
            connection_id: "conn_1_abc".to_string(),
        }
    }

    fn envelope(id: &str, kind: &str) -> EventEnvelope {
        EventEnvelope {
            r#type: kind.to_string(),
            payload: json!({ "text": "hi" }),
            timestamp: 1_000,
            id: id.to_string(),
            user_id: None,
            room_id: Some("lobby".to_string()),
        }
    }

    fn room_message(text: &str) -> SendEventRequest {
        SendEventRequest {
            r#type: "room_message".to_string(),
            payload: json!({ "text": text }),
            room_id: Some("lobby".to_string()),
        }
    }

    /// 開いたままのストリーム (events を流したあと終了しない)
    fn open_stream_with(events: Vec<EventEnvelope>) -> EventStream {
        let items = events.into_iter().map(Ok).collect::<Vec<_>>();
        Box::pin(futures_util::stream::iter(items).chain(futures_util::stream::pending()))
    }

    fn spawn_driver(
        api: MockPortalApi,
        config: SessionConfig,
    ) -> (
        mpsc::Sender<DriverInput>,
        mpsc::UnboundedReceiver<SessionOutput>,
        tokio::task::JoinHandle<SessionState>,
    ) {
        let (outputs_tx, outputs_rx) = mpsc::unbounded_channel();
        let (inputs_tx, inputs_rx) = mpsc::channel(16);
        let driver = SessionDriver::new(Arc::new(api), ClientSession::new(config), outputs_tx);
        let handle = tokio::spawn(driver.run(inputs_rx));
        (inputs_tx, outputs_rx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_session_stops_connecting() {
        // テスト項目: 再接続が上限回数失敗すると Exhausted になり、以降は接続を試みない
        // given (前提条件):
        let mut api = MockPortalApi::new();
        api.expect_issue_token()
            .times(3)
            .returning(|| Err(ClientError::Connection("connection refused".to_string())));
        api.expect_open_stream().never();
        let config = SessionConfig {
            max_reconnect_attempts: 3,
            ..SessionConfig::default()
        };

        // when (操作):
        let (inputs, mut outputs, handle) = spawn_driver(api, config);
        let error = loop {
            match outputs.recv().await {
                Some(SessionOutput::Error(e)) => break e,
                Some(_) => continue,
                None => panic!("driver stopped before reporting"),
            }
        };
        tokio::time::sleep(Duration::from_secs(60)).await;
        inputs.send(DriverInput::Quit).await.unwrap();
        let state = handle.await.unwrap();

        // then (期待する結果):
        assert_eq!(error, SessionError::ReconnectExhausted { attempts: 3 });
        assert_eq!(state, SessionState::Exhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_events_are_delivered_once() {
        // テスト項目: ストリームで受信したイベントは重複を除いて配信される
        // given (前提条件):
        let mut api = MockPortalApi::new();
        api.expect_issue_token().returning(|| Ok(ticket()));
        api.expect_open_stream()
            .withf(|token| token == "token-1")
            .returning(|_| {
                Ok(open_stream_with(vec![
                    envelope("evt-1", "room_message"),
                    envelope("evt-1", "room_message"),
                    envelope("evt-2", "notification"),
                ]))
            });

        // when (操作):
        let (inputs, mut outputs, handle) = spawn_driver(api, SessionConfig::default());
        let mut delivered = Vec::new();
        while delivered.len() < 2 {
            match outputs.recv().await {
                Some(SessionOutput::Event(envelope)) => delivered.push(envelope.id),
                Some(_) => continue,
                None => break,
            }
        }
        inputs.send(DriverInput::Quit).await.unwrap();
        let state = handle.await.unwrap();

        // then (期待する結果):
        assert_eq!(delivered, vec!["evt-1".to_string(), "evt-2".to_string()]);
        assert_eq!(state, SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_events_flush_in_order() {
        // テスト項目: 非表示中に送信したイベントは表示復帰時に順番どおり送信される
        // given (前提条件):
        let mut api = MockPortalApi::new();
        api.expect_issue_token().returning(|| Ok(ticket()));
        api.expect_open_stream()
            .returning(|_| Ok(open_stream_with(Vec::new())));
        api.expect_send_event()
            .withf(|_, request| request.r#type == "heartbeat")
            .returning(|_, _| Ok(()));
        let mut sequence = Sequence::new();
        for text in ["first", "second"] {
            api.expect_send_event()
                .withf(move |connection_id, request| {
                    connection_id == "conn_1_abc" && *request == room_message(text)
                })
                .times(1)
                .in_sequence(&mut sequence)
                .returning(|_, _| Ok(()));
        }

        // when (操作):
        let (inputs, _outputs, handle) = spawn_driver(api, SessionConfig::default());
        inputs
            .send(DriverInput::SetVisibility(Visibility::Hidden))
            .await
            .unwrap();
        inputs.send(DriverInput::Send(room_message("first"))).await.unwrap();
        inputs.send(DriverInput::Send(room_message("second"))).await.unwrap();
        inputs
            .send(DriverInput::SetVisibility(Visibility::Visible))
            .await
            .unwrap();
        inputs.send(DriverInput::Quit).await.unwrap();
        let state = handle.await.unwrap();

        // then (期待する結果):
        // 送信順序は MockPortalApi の Sequence で検証される
        assert_eq!(state, SessionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_triggers_reconnect() {
        // テスト項目: サーバーがストリームを閉じると再接続中の状態になる
        // given (前提条件):
        let mut api = MockPortalApi::new();
        api.expect_issue_token().returning(|| Ok(ticket()));
        api.expect_open_stream()
            .returning(|_| {
                Ok(Box::pin(futures_util::stream::empty::<
                    Result<EventEnvelope, ClientError>,
                >()))
            });

        // when (操作):
        let (inputs, mut outputs, handle) = spawn_driver(api, SessionConfig::default());
        let mut states = Vec::new();
        while let Some(output) = outputs.recv().await {
            if let SessionOutput::StateChanged(state) = output {
                states.push(state);
                if state == SessionState::Reconnecting {
                    break;
                }
            }
        }
        inputs.send(DriverInput::Quit).await.unwrap();
        handle.await.unwrap();

        // then (期待する結果):
        assert_eq!(states.first(), Some(&SessionState::Connected));
        assert_eq!(states.last(), Some(&SessionState::Reconnecting));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_event_keeps_stream_open() {
        // テスト項目: 個別イベントの拒否は通知されるが接続は維持される
        // given (前提条件):
        let mut api = MockPortalApi::new();
        api.expect_issue_token().times(1).returning(|| Ok(ticket()));
        api.expect_open_stream()
            .times(1)
            .returning(|_| Ok(open_stream_with(Vec::new())));
        api.expect_send_event()
            .withf(|_, request| request.r#type == "admin_broadcast")
            .returning(|_, _| {
                Err(ClientError::Rejected {
                    status: 403,
                    message: "forbidden".to_string(),
                })
            });
        let forbidden = SendEventRequest {
            r#type: "admin_broadcast".to_string(),
            payload: json!({ "message": "hello" }),
            room_id: None,
        };

        // when (操作):
        let (inputs, mut outputs, handle) = spawn_driver(api, SessionConfig::default());
        inputs.send(DriverInput::Send(forbidden)).await.unwrap();
        let rejected = loop {
            match outputs.recv().await {
                Some(SessionOutput::Rejected(e)) => break e,
                Some(_) => continue,
                None => panic!("driver stopped before rejecting"),
            }
        };
        inputs.send(DriverInput::Quit).await.unwrap();
        let state = handle.await.unwrap();

        // then (期待する結果):
        assert!(matches!(rejected, ClientError::Rejected { status: 403, .. }));
        assert_eq!(state, SessionState::Disconnected);
    }
}
