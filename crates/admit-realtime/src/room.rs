//! Room identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Room every admin connection joins.
pub const ADMIN_ROOM: &str = "admin-all";

/// Roles that have a role-wide room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Agent,
    Staff,
    Admin,
}

impl Role {
    /// Parses a role name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "agent" => Some(Self::Agent),
            "staff" => Some(Self::Staff),
            "admin" | "administrator" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent => write!(f, "agent"),
            Self::Staff => write!(f, "staff"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// A named group of connections.
///
/// Rooms form a flat namespace; [`Room::id`] is the canonical string key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// A single user's room, keyed by the bare user id.
    User(String),
    /// `agent-<id>`
    Agent(String),
    /// `staff-<id>`
    Staff(String),
    /// `admin-all`
    AdminAll,
    /// `<role>-all`; the admin role maps to [`Room::AdminAll`].
    Role(Role),
}

impl Room {
    /// Room for everyone holding `role`.
    #[must_use]
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Admin => Self::AdminAll,
            other => Self::Role(other),
        }
    }

    /// Canonical room key.
    #[must_use]
    pub fn id(&self) -> String {
        match self {
            Self::User(id) => id.clone(),
            Self::Agent(id) => format!("agent-{}", id),
            Self::Staff(id) => format!("staff-{}", id),
            Self::AdminAll | Self::Role(Role::Admin) => ADMIN_ROOM.to_string(),
            Self::Role(role) => format!("{}-all", role),
        }
    }
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}
