//! Who may dispatch what, and to whom.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{
    error::DispatchError,
    event::EventKind,
    value_object::{Role, UserId},
};

/// Authenticated caller identity as asserted by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub role: Role,
}

impl Identity {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Originator of a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    /// In-process collaborators (heartbeat, handshake, webhook completion).
    System,
    User(Identity),
}

impl Sender {
    pub fn user(user_id: UserId, role: Role) -> Self {
        Sender::User(Identity::new(user_id, role))
    }

    pub fn is_privileged(&self) -> bool {
        match self {
            Sender::System => true,
            Sender::User(identity) => identity.is_admin(),
        }
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Sender::System => None,
            Sender::User(identity) => Some(&identity.user_id),
        }
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::System => f.write_str("system"),
            Sender::User(identity) => write!(f, "{}({})", identity.user_id, identity.role),
        }
    }
}

/// Reject restricted kinds from unprivileged senders.
pub fn authorize(sender: &Sender, kind: &EventKind) -> Result<(), DispatchError> {
    if kind.is_restricted() && !sender.is_privileged() {
        return Err(DispatchError::Unauthorized {
            kind: kind.as_str().to_string(),
        });
    }
    Ok(())
}

/// Audience of an administrative broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastTarget {
    All,
    Admin,
    Client,
    Room,
}

impl FromStr for BroadcastTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(BroadcastTarget::All),
            "admin" => Ok(BroadcastTarget::Admin),
            "client" => Ok(BroadcastTarget::Client),
            "room" => Ok(BroadcastTarget::Room),
            other => Err(format!("unknown broadcast target '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}
