//! Event formatting utilities for client display.

use serde_json::Value;
use switchboard_server::infrastructure::dto::event::EventEnvelope;
use switchboard_shared::time::timestamp_to_rfc3339;

use crate::{
    error::{ClientError, SessionError},
    session::SessionState,
};

const BANNER: &str = "============================================================";
const RULE: &str = "------------------------------------------------------------";

/// Event formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a received event
    ///
    /// # Arguments
    ///
    /// * `envelope` - The event as received on the stream
    /// * `current_user_id` - The current user's ID (to mark own messages as "me")
    ///
    /// # Returns
    ///
    /// A formatted string for the terminal
    pub fn format_event(envelope: &EventEnvelope, current_user_id: &str) -> String {
        let at = timestamp_to_rfc3339(envelope.timestamp);
        let payload = &envelope.payload;

        match envelope.r#type.as_str() {
            "connection_status" => format!(
                "\n\n{}\nConnected as {} ({})\nat {}\n{}\n",
                BANNER,
                text_field(payload, "connectionId"),
                text_field(payload, "role"),
                at,
                BANNER
            ),
            "room_joined" => format!(
                "\n+ joined {} ({} members) at {}\n",
                room_of(envelope),
                payload.get("memberCount").and_then(Value::as_u64).unwrap_or(0),
                at
            ),
            "room_left" => format!("\n- left {} at {}\n", room_of(envelope), at),
            "room_message" => {
                let from = envelope.user_id.as_deref().unwrap_or("unknown");
                let me_suffix = if from == current_user_id { " (me)" } else { "" };
                format!(
                    "\n\n{}\n[{}] @{}{}: {}\nsent at {}\n{}\n",
                    RULE,
                    room_of(envelope),
                    from,
                    me_suffix,
                    message_text(payload),
                    at,
                    RULE
                )
            }
            "admin_broadcast" | "role_broadcast" => format!(
                "\n\n{}\n[{}] ({}) {}\nat {}\n{}\n",
                BANNER,
                envelope.r#type,
                payload
                    .get("priority")
                    .and_then(Value::as_str)
                    .unwrap_or("normal"),
                message_text(payload),
                at,
                BANNER
            ),
            other => format!("\n[{}] {}\nat {}\n", other, payload, at),
        }
    }

    /// Format a session state change
    pub fn format_state(state: SessionState) -> String {
        let label = match state {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting...",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "connection lost, reconnecting...",
            SessionState::Exhausted => "gave up reconnecting (type /restart to try again)",
        };
        format!("\n* {}\n", label)
    }

    /// Format a session-level error
    pub fn format_session_error(error: &SessionError) -> String {
        format!("\n! {}\n", error)
    }

    /// Format a rejected event
    pub fn format_rejected(error: &ClientError) -> String {
        format!("\n! event not delivered: {}\n", error)
    }
}

fn room_of(envelope: &EventEnvelope) -> &str {
    envelope
        .room_id
        .as_deref()
        .or_else(|| envelope.payload.get("roomId").and_then(Value::as_str))
        .unwrap_or("-")
}

fn text_field<'a>(payload: &'a Value, key: &str) -> &'a str {
    payload.get(key).and_then(Value::as_str).unwrap_or("-")
}

/// `payload.text` / `payload.message`、なければ JSON をそのまま表示
fn message_text(payload: &Value) -> String {
    payload
        .get("text")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}
