//! Payload sanitization for client- and admin-supplied event data.
//!
//! Every string (object keys included) is HTML-escaped so that a payload can
//! be rendered by a browser client without further treatment.

use serde_json::{Map, Value};

use super::error::SanitizeError;

pub const MAX_PAYLOAD_DEPTH: usize = 16;

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn sanitize_payload(value: Value) -> Result<Value, SanitizeError> {
    sanitize_at(value, 0)
}

fn sanitize_at(value: Value, depth: usize) -> Result<Value, SanitizeError> {
    if depth > MAX_PAYLOAD_DEPTH {
        return Err(SanitizeError::TooDeep {
            max: MAX_PAYLOAD_DEPTH,
        });
    }
    Ok(match value {
        Value::String(s) => Value::String(escape_html(&s)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| sanitize_at(item, depth + 1))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(fields) => {
            let mut sanitized = Map::with_capacity(fields.len());
            for (key, field) in fields {
                sanitized.insert(escape_html(&key), sanitize_at(field, depth + 1)?);
            }
            Value::Object(sanitized)
        }
        scalar => scalar,
    })
}
