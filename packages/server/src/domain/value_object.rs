//! Value objects
//!
//! 識別子やロールなど、不変で検証済みの値を表現する型。
//! 生の文字列は UI 層で一度だけ検証され、以降はこれらの型として扱われます。

use std::{
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

const MAX_IDENTIFIER_LEN: usize = 128;

fn validate_identifier(
    field: &'static str,
    value: &str,
    allowed: impl Fn(char) -> bool,
) -> Result<(), ValueObjectError> {
    if value.is_empty() {
        return Err(ValueObjectError::Empty(field));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(ValueObjectError::TooLong {
            field,
            max: MAX_IDENTIFIER_LEN,
        });
    }
    if let Some(ch) = value.chars().find(|c| !allowed(*c)) {
        return Err(ValueObjectError::InvalidCharacter { field, ch });
    }
    Ok(())
}

macro_rules! string_value_object {
    ($(#[$meta:meta])* $name:ident, $field:literal, $allowed:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: String) -> Result<Self, ValueObjectError> {
                validate_identifier($field, &value, $allowed)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValueObjectError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValueObjectError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value.to_string())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_value_object!(
    /// Opaque identifier of one live stream, allocated at token issuance.
    ConnectionId,
    "connection_id",
    |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'
);

string_value_object!(
    /// Identity of a portal user, as asserted by the upstream auth layer.
    UserId,
    "user_id",
    |c: char| !c.is_control() && !c.is_whitespace()
);

string_value_object!(
    /// Name of a multicast group, e.g. `project-42`.
    RoomName,
    "room_name",
    |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | '-')
);

/// Allocates connection identifiers.
///
/// The sequence is monotonic for the lifetime of the factory, so an id is
/// never handed out twice. The random suffix keeps ids from colliding with
/// tokens minted by a previous process that are still within their TTL.
#[derive(Debug, Default)]
pub struct ConnectionIdFactory {
    sequence: AtomicU64,
}

impl ConnectionIdFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> ConnectionId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let suffix = Uuid::new_v4().simple().to_string();
        ConnectionId(format!("conn_{sequence}_{}", &suffix[..12]))
    }
}

/// Role bound to a connection at token issuance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValueObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "client" => Ok(Role::Client),
            other => Err(ValueObjectError::UnknownRole(other.to_string())),
        }
    }
}

/// Unix timestamp in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn new(millis: i64) -> Self {
        Self(millis)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

/// Per-event identifier, used by clients for deduplication and logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
