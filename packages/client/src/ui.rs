//! UI utilities for the client.

use std::io::Write;

use serde_json::json;
use switchboard_server::infrastructure::dto::http::SendEventRequest;

/// Redisplay the prompt after receiving an event
pub fn redisplay_prompt(user_id: &str, room: Option<&str>) {
    match room {
        Some(room) => print!("{}@{}> ", user_id, room),
        None => print!("{}> ", user_id),
    }
    std::io::stdout().flush().ok();
}

/// One line typed at the prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Join(String),
    Leave(String),
    Hide,
    Show,
    Restart,
    Quit,
    Message(String),
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> InputLine {
    let line = line.trim();
    if line.is_empty() {
        return InputLine::Empty;
    }
    if !line.starts_with('/') {
        return InputLine::Message(line.to_string());
    }

    let mut parts = line.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    match (command, argument) {
        ("/join", Some(room)) => InputLine::Join(room.to_string()),
        ("/leave", Some(room)) => InputLine::Leave(room.to_string()),
        ("/hide", None) => InputLine::Hide,
        ("/show", None) => InputLine::Show,
        ("/restart", None) => InputLine::Restart,
        ("/quit", None) => InputLine::Quit,
        _ => InputLine::Unknown(line.to_string()),
    }
}

pub fn join_room(room: &str) -> SendEventRequest {
    room_event("join_room", room, json!({}))
}

pub fn leave_room(room: &str) -> SendEventRequest {
    room_event("leave_room", room, json!({}))
}

pub fn room_message(room: &str, text: &str) -> SendEventRequest {
    room_event("room_message", room, json!({ "text": text }))
}

fn room_event(kind: &str, room: &str, payload: serde_json::Value) -> SendEventRequest {
    SendEventRequest {
        r#type: kind.to_string(),
        payload,
        room_id: Some(room.to_string()),
    }
}
