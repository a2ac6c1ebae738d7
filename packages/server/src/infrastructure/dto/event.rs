//! SSE event envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{type, payload, timestamp, id, userId?, roomId?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    pub r#type: String,
    #[serde(default)]
    pub payload: Value,
    pub timestamp: i64,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
}
