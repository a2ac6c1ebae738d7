//! Interactive client: readline input, session driver and terminal output.

use std::sync::Arc;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::{
    api::HttpPortalApi,
    driver::{DriverInput, SessionDriver, SessionOutput},
    formatter::MessageFormatter,
    session::{ClientSession, SessionConfig, SessionState, Visibility},
    ui::{self, InputLine, redisplay_prompt},
};

/// Settings for one interactive client run
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub url: String,
    pub user_id: String,
    pub role: String,
    /// 接続のたびに (再接続を含む) 参加するルーム
    pub room: Option<String>,
    pub session: SessionConfig,
}

/// Run the SSE client until the user quits.
pub async fn run_client(config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Connecting to {} as '{}' ({})",
        config.url,
        config.user_id,
        config.role
    );

    let api = Arc::new(HttpPortalApi::new(&config.url, &config.user_id, &config.role));
    let (output_tx, mut output_rx) = mpsc::unbounded_channel();
    let (driver_tx, driver_rx) = mpsc::channel::<DriverInput>(64);
    let driver = SessionDriver::new(api, ClientSession::new(config.session.clone()), output_tx);
    let driver_handle = tokio::spawn(driver.run(driver_rx));

    println!(
        "\nYou are '{}'. Type messages and press Enter to send.\n\
         Commands: /join <room>, /leave <room>, /hide, /show, /restart, /quit\n",
        config.user_id
    );

    let mut line_rx = spawn_readline(config.user_id.clone());
    let mut active_room = config.room.clone();

    loop {
        tokio::select! {
            line = line_rx.recv() => {
                let Some(line) = line else {
                    // Ctrl+C / Ctrl+D
                    break;
                };
                let input = match ui::parse_input(&line) {
                    InputLine::Join(room) => {
                        let request = ui::join_room(&room);
                        active_room = Some(room);
                        DriverInput::Send(request)
                    }
                    InputLine::Leave(room) => {
                        if active_room.as_deref() == Some(room.as_str()) {
                            active_room = None;
                        }
                        DriverInput::Send(ui::leave_room(&room))
                    }
                    InputLine::Hide => DriverInput::SetVisibility(Visibility::Hidden),
                    InputLine::Show => DriverInput::SetVisibility(Visibility::Visible),
                    InputLine::Restart => DriverInput::Restart,
                    InputLine::Quit => break,
                    InputLine::Message(text) => match &active_room {
                        Some(room) => DriverInput::Send(ui::room_message(room, &text)),
                        None => {
                            println!("Join a room first: /join <room>");
                            continue;
                        }
                    },
                    InputLine::Empty => continue,
                    InputLine::Unknown(command) => {
                        println!("Unknown command: {}", command);
                        continue;
                    }
                };
                if driver_tx.send(input).await.is_err() {
                    break;
                }
            }
            output = output_rx.recv() => {
                let Some(output) = output else {
                    break;
                };
                let formatted = match output {
                    SessionOutput::Event(envelope) => {
                        MessageFormatter::format_event(&envelope, &config.user_id)
                    }
                    SessionOutput::StateChanged(state) => {
                        // 新しい接続はルームに属していないので参加し直す
                        if state == SessionState::Connected
                            && let Some(room) = &active_room
                        {
                            let _ = driver_tx.send(DriverInput::Send(ui::join_room(room))).await;
                        }
                        MessageFormatter::format_state(state)
                    }
                    SessionOutput::Error(error) => MessageFormatter::format_session_error(&error),
                    SessionOutput::Rejected(error) => MessageFormatter::format_rejected(&error),
                };
                print!("{}", formatted);
                redisplay_prompt(&config.user_id, active_room.as_deref());
            }
        }
    }

    // Quit で driver を止め、ストリームを閉じる
    let _ = driver_tx.send(DriverInput::Quit).await;
    let final_state = driver_handle.await?;
    tracing::info!("Client session ended ({:?})", final_state);

    Ok(())
}

/// Spawn a blocking thread for rustyline (synchronous readline)
fn spawn_readline(user_id: String) -> mpsc::UnboundedReceiver<String> {
    let (input_tx, input_rx) = mpsc::unbounded_channel::<String>();

    std::thread::spawn(move || {
        let mut rl = match DefaultEditor::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };

        let prompt = format!("{}> ", user_id);

        loop {
            match rl.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        rl.add_history_entry(line).ok();
                        if input_tx.send(line.to_string()).is_err() {
                            // Channel closed, exit thread
                            break;
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    // Ctrl+C
                    tracing::info!("Interrupted");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    // Ctrl+D
                    tracing::info!("EOF");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    });

    input_rx
}
