//! Client wire protocol.
//!
//! Clients send JSON text frames tagged by `type`. The server answers joins,
//! pings and bad frames with control frames shaped like event frames:
//! `{"event": "...", "data": {...}}`.

use crate::error::RealtimeError;
use crate::events::EntityId;
use crate::room::{Role, Room};
use serde::{Deserialize, Serialize};

/// Frames a client may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    JoinUser {
        #[serde(rename = "userId")]
        user_id: EntityId,
    },
    JoinAgent {
        #[serde(rename = "agentId")]
        agent_id: EntityId,
    },
    JoinStaff {
        #[serde(rename = "staffId")]
        staff_id: EntityId,
    },
    JoinAdmin,
    Ping,
}

impl ClientMessage {
    /// Parses a text frame.
    pub fn parse(text: &str) -> Result<Self, RealtimeError> {
        serde_json::from_str(text).map_err(|e| RealtimeError::InvalidMessage(e.to_string()))
    }

    /// The join this message requests, if any.
    #[must_use]
    pub fn join_request(&self) -> Option<JoinRequest> {
        match self {
            Self::JoinUser { user_id } => Some(JoinRequest::User(user_id.to_string())),
            Self::JoinAgent { agent_id } => Some(JoinRequest::Agent(agent_id.to_string())),
            Self::JoinStaff { staff_id } => Some(JoinRequest::Staff(staff_id.to_string())),
            Self::JoinAdmin => Some(JoinRequest::Admin),
            Self::Ping => None,
        }
    }
}

/// A request to join the rooms of one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    User(String),
    Agent(String),
    Staff(String),
    Admin,
}

impl JoinRequest {
    /// Rooms a granted join subscribes the connection to.
    ///
    /// Agents and staff also join their role-wide room.
    #[must_use]
    pub fn rooms(&self) -> Vec<Room> {
        match self {
            Self::User(id) => vec![Room::User(id.clone())],
            Self::Agent(id) => vec![Room::Agent(id.clone()), Room::for_role(Role::Agent)],
            Self::Staff(id) => vec![Room::Staff(id.clone()), Room::for_role(Role::Staff)],
            Self::Admin => vec![Room::AdminAll],
        }
    }

    /// The role the joining identity claims, if any.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        match self {
            Self::User(_) => None,
            Self::Agent(_) => Some(Role::Agent),
            Self::Staff(_) => Some(Role::Staff),
            Self::Admin => Some(Role::Admin),
        }
    }

    /// The identifier the joining identity claims, if any.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::User(id) | Self::Agent(id) | Self::Staff(id) => Some(id),
            Self::Admin => None,
        }
    }
}

/// Control frames sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    Joined { rooms: Vec<String> },
    Error { message: String },
    Pong,
}

impl ServerMessage {
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"event":"error"}"#.to_string())
    }
}
