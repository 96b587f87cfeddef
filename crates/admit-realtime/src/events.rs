//! Event payloads delivered to clients.
//!
//! Each domain event names the student's owning user and, optionally, the
//! agent and staff member assigned to the case. The router derives target
//! rooms from those fields; everything else is passed through to clients.

use crate::room::Room;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Identifier that producers may supply as either a JSON string or a number.
///
/// Re-serializing keeps whichever JSON form the producer sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Event names as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    ProfileUpdated,
    WorkflowUpdated,
    DocumentUpdated,
    PaymentUpdated,
    Notification,
    Announcement,
}

impl EventName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProfileUpdated => "profile-updated",
            Self::WorkflowUpdated => "workflow-updated",
            Self::DocumentUpdated => "document-updated",
            Self::PaymentUpdated => "payment-updated",
            Self::Notification => "notification",
            Self::Announcement => "announcement",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who a case event is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseParticipants<'a> {
    pub user_id: &'a EntityId,
    pub assigned_agent: Option<&'a EntityId>,
    pub assigned_staff: Option<&'a EntityId>,
}

impl CaseParticipants<'_> {
    /// The owning user's room, the assigned agent's and staff member's rooms
    /// when present, and always the admin room.
    #[must_use]
    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms = vec![Room::User(self.user_id.to_string())];
        if let Some(agent) = self.assigned_agent {
            rooms.push(Room::Agent(agent.to_string()));
        }
        if let Some(staff) = self.assigned_staff {
            rooms.push(Room::Staff(staff.to_string()));
        }
        rooms.push(Room::AdminAll);
        rooms
    }
}

/// A domain event about a student's case.
pub trait CaseEvent: Serialize {
    const EVENT: EventName;

    fn participants(&self) -> CaseParticipants<'_>;
}

macro_rules! case_event {
    ($ty:ty, $event:expr) => {
        impl CaseEvent for $ty {
            const EVENT: EventName = $event;

            fn participants(&self) -> CaseParticipants<'_> {
                CaseParticipants {
                    user_id: &self.user_id,
                    assigned_agent: self.assigned_agent.as_ref(),
                    assigned_staff: self.assigned_staff.as_ref(),
                }
            }
        }
    };
}

/// A student's profile changed. Changed fields travel in `changes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub student_id: EntityId,
    pub user_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<EntityId>,
    #[serde(flatten)]
    pub changes: Map<String, Value>,
}

/// A case moved to another workflow stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowUpdate {
    pub student_id: EntityId,
    pub user_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<EntityId>,
    pub stage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// A document's review status changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    pub student_id: EntityId,
    pub user_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<EntityId>,
    pub document_id: EntityId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

/// A payment's status changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentUpdate {
    pub student_id: EntityId,
    pub user_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff: Option<EntityId>,
    pub payment_id: EntityId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}

case_event!(ProfileUpdate, EventName::ProfileUpdated);
case_event!(WorkflowUpdate, EventName::WorkflowUpdated);
case_event!(DocumentUpdate, EventName::DocumentUpdated);
case_event!(PaymentUpdate, EventName::PaymentUpdated);

/// Free-form notification or announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Serializes `{"event": name, "data": {...payload, "timestamp": now}}`.
///
/// Payloads that do not serialize to a JSON object are wrapped as
/// `{"value": payload}` so the timestamp always has somewhere to live.
pub fn envelope<T: Serialize + ?Sized>(
    event: EventName,
    payload: &T,
    now: DateTime<Utc>,
) -> serde_json::Result<String> {
    let mut data = match serde_json::to_value(payload)? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    data.insert(
        "timestamp".to_string(),
        Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );

    serde_json::to_string(&serde_json::json!({
        "event": event.as_str(),
        "data": data,
    }))
}
