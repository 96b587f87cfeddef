//! Connection registry and room fan-out.

use crate::auth::{Identity, JoinAuthorizer, OpenJoins};
use crate::error::{RealtimeError, RealtimeResult};
use crate::events::{
    envelope, CaseEvent, DocumentUpdate, EventName, Notification, PaymentUpdate, ProfileUpdate,
    WorkflowUpdate,
};
use crate::metrics;
use crate::protocol::{ClientMessage, JoinRequest, ServerMessage};
use crate::room::{Role, Room};
use admit_config::RealtimeConfig;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub event: &'static str,
    pub rooms: Vec<String>,
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// Connections whose queue was full or closed.
    pub failed: usize,
}

/// Snapshot of the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterStats {
    pub connections: usize,
    /// Member count per non-empty room.
    pub rooms: BTreeMap<String, usize>,
}

struct Connection {
    sender: mpsc::Sender<String>,
    identity: Option<Identity>,
    rooms: HashSet<String>,
    connected_at: DateTime<Utc>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl Registry {
    fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        for room in &connection.rooms {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&id);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        Some(connection)
    }
}

/// Routes events to the connections that joined the matching rooms.
///
/// Cloning is cheap; every clone shares one registry. Each connection owns a
/// bounded outbound queue, and a full or closed queue only affects that
/// connection.
#[derive(Clone)]
pub struct RoomRouter {
    registry: Arc<RwLock<Registry>>,
    authorizer: Arc<dyn JoinAuthorizer>,
    channel_capacity: usize,
}

impl RoomRouter {
    #[must_use]
    pub fn new(authorizer: Arc<dyn JoinAuthorizer>, channel_capacity: usize) -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            authorizer,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Router using the configured join policy and queue size.
    #[must_use]
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(
            crate::auth::authorizer_for(config.join_policy),
            config.channel_capacity,
        )
    }

    /// Whether handshakes must carry a token.
    #[must_use]
    pub fn requires_identity(&self) -> bool {
        self.authorizer.requires_identity()
    }

    /// Registers a connection with no rooms. Frames for it arrive on the
    /// returned receiver.
    pub fn connect(&self, identity: Option<Identity>) -> (ConnectionId, mpsc::Receiver<String>) {
        let (sender, receiver) = mpsc::channel(self.channel_capacity);
        let id = ConnectionId::new();

        let count = {
            let mut registry = self.registry.write();
            registry.connections.insert(
                id,
                Connection {
                    sender,
                    identity,
                    rooms: HashSet::new(),
                    connected_at: Utc::now(),
                },
            );
            registry.connections.len()
        };
        metrics::connections(count);

        info!(connection_id = %id, connections = count, "Realtime client connected");
        (id, receiver)
    }

    /// Drops a connection and all of its memberships.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let (removed, count) = {
            let mut registry = self.registry.write();
            let removed = registry.remove(id);
            (removed, registry.connections.len())
        };
        metrics::connections(count);

        match removed {
            Some(connection) => {
                let seconds = (Utc::now() - connection.connected_at).num_seconds();
                info!(
                    connection_id = %id,
                    rooms = connection.rooms.len(),
                    connected_secs = seconds,
                    "Realtime client disconnected"
                );
                true
            }
            None => false,
        }
    }

    /// Adds a connection to the rooms of `request` after authorizing it.
    /// Joining a room twice is a no-op. Returns the room ids joined.
    pub fn join(&self, id: ConnectionId, request: &JoinRequest) -> RealtimeResult<Vec<String>> {
        let mut registry = self.registry.write();
        let connection = registry
            .connections
            .get(&id)
            .ok_or_else(|| RealtimeError::UnknownConnection(id.to_string()))?;

        self.authorizer.authorize(connection.identity.as_ref(), request)?;

        let rooms: Vec<String> = request.rooms().iter().map(Room::id).collect();
        for room in &rooms {
            registry.rooms.entry(room.clone()).or_default().insert(id);
        }
        if let Some(connection) = registry.connections.get_mut(&id) {
            connection.rooms.extend(rooms.iter().cloned());
        }

        debug!(connection_id = %id, rooms = ?rooms, "Joined rooms");
        Ok(rooms)
    }

    /// Handles one inbound text frame and queues the reply to the sender.
    pub fn handle_client_message(&self, id: ConnectionId, text: &str) -> ServerMessage {
        let reply = match ClientMessage::parse(text) {
            Ok(ClientMessage::Ping) => ServerMessage::Pong,
            Ok(message) => match message.join_request() {
                Some(request) => match self.join(id, &request) {
                    Ok(rooms) => ServerMessage::Joined { rooms },
                    Err(e) => {
                        warn!(connection_id = %id, error = %e, "Join rejected");
                        ServerMessage::Error {
                            message: e.to_string(),
                        }
                    }
                },
                None => ServerMessage::Error {
                    message: "Unsupported message".to_string(),
                },
            },
            Err(e) => {
                debug!(connection_id = %id, error = %e, "Invalid client frame");
                ServerMessage::Error {
                    message: e.to_string(),
                }
            }
        };

        let sender = self
            .registry
            .read()
            .connections
            .get(&id)
            .map(|c| c.sender.clone());
        if let Some(sender) = sender {
            if let Err(e) = sender.try_send(reply.to_json()) {
                debug!(connection_id = %id, error = %e, "Failed to queue reply");
            }
        }
        reply
    }

    pub fn broadcast_profile_update(&self, update: &ProfileUpdate) -> DeliveryReport {
        self.broadcast_case(update)
    }

    pub fn broadcast_workflow_update(&self, update: &WorkflowUpdate) -> DeliveryReport {
        self.broadcast_case(update)
    }

    pub fn broadcast_document_update(&self, update: &DocumentUpdate) -> DeliveryReport {
        self.broadcast_case(update)
    }

    pub fn broadcast_payment_update(&self, update: &PaymentUpdate) -> DeliveryReport {
        self.broadcast_case(update)
    }

    /// Sends a case event to the owner, the assigned agent and staff member,
    /// and the admin room.
    pub fn broadcast_case<E: CaseEvent>(&self, event: &E) -> DeliveryReport {
        let rooms = event.participants().rooms();
        self.emit(E::EVENT, &rooms, event)
    }

    /// Notification to one user's room.
    pub fn send_notification(
        &self,
        user_id: impl fmt::Display,
        notification: &Notification,
    ) -> DeliveryReport {
        let room = Room::User(user_id.to_string());
        self.emit(EventName::Notification, &[room], notification)
    }

    /// Notification to everyone in a role-wide room.
    pub fn send_notification_to_role(&self, role: Role, notification: &Notification) -> DeliveryReport {
        self.emit(EventName::Notification, &[Room::for_role(role)], notification)
    }

    /// Announcement to every connection, joined or not.
    pub fn send_announcement(&self, notification: &Notification) -> DeliveryReport {
        let Some(frame) = Self::encode(EventName::Announcement, notification) else {
            return DeliveryReport::empty(EventName::Announcement, Vec::new());
        };

        let registry = self.registry.read();
        let mut report = DeliveryReport::empty(EventName::Announcement, Vec::new());
        for (id, connection) in &registry.connections {
            report.record(*id, connection.sender.try_send(frame.clone()));
        }
        drop(registry);

        metrics::event(EventName::Announcement.as_str());
        debug!(delivered = report.delivered, failed = report.failed, "Announcement sent");
        report
    }

    /// Queues one frame for every member of `rooms`. A connection in several
    /// target rooms receives the frame once.
    pub fn emit<T: Serialize + ?Sized>(
        &self,
        event: EventName,
        rooms: &[Room],
        payload: &T,
    ) -> DeliveryReport {
        let room_ids: Vec<String> = rooms.iter().map(Room::id).collect();
        let Some(frame) = Self::encode(event, payload) else {
            return DeliveryReport::empty(event, room_ids);
        };

        let registry = self.registry.read();
        let mut report = DeliveryReport::empty(event, Vec::new());
        let mut seen = HashSet::new();

        for room in &room_ids {
            let Some(members) = registry.rooms.get(room) else {
                continue;
            };
            for id in members {
                if !seen.insert(*id) {
                    continue;
                }
                if let Some(connection) = registry.connections.get(id) {
                    let result = connection.sender.try_send(frame.clone());
                    report.record(*id, result);
                }
            }
        }
        drop(registry);
        report.rooms = room_ids;

        metrics::event(event.as_str());
        debug!(
            event = event.as_str(),
            rooms = ?report.rooms,
            delivered = report.delivered,
            failed = report.failed,
            "Event broadcast"
        );
        report
    }

    fn encode<T: Serialize + ?Sized>(event: EventName, payload: &T) -> Option<String> {
        match envelope(event, payload, Utc::now()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(event = event.as_str(), error = %e, "Failed to serialize event");
                None
            }
        }
    }

    #[must_use]
    pub fn connected_count(&self) -> usize {
        self.registry.read().connections.len()
    }

    /// Members of `room`. Unknown rooms have zero members.
    #[must_use]
    pub fn room_size(&self, room: &str) -> usize {
        self.registry.read().rooms.get(room).map_or(0, HashSet::len)
    }

    /// Rooms a connection has joined.
    #[must_use]
    pub fn rooms_of(&self, id: ConnectionId) -> Vec<String> {
        let registry = self.registry.read();
        let mut rooms: Vec<String> = registry
            .connections
            .get(&id)
            .map(|c| c.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Member count of every non-empty room.
    #[must_use]
    pub fn rooms(&self) -> BTreeMap<String, usize> {
        self.registry
            .read()
            .rooms
            .iter()
            .map(|(room, members)| (room.clone(), members.len()))
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> RouterStats {
        RouterStats {
            connections: self.connected_count(),
            rooms: self.rooms(),
        }
    }

    /// Drops every connection. Their receivers end once drained.
    pub fn shutdown(&self) {
        let dropped = {
            let mut registry = self.registry.write();
            let dropped = registry.connections.len();
            registry.connections.clear();
            registry.rooms.clear();
            dropped
        };
        metrics::connections(0);
        info!(connections = dropped, "Realtime router shut down");
    }
}

impl Default for RoomRouter {
    fn default() -> Self {
        Self::new(Arc::new(OpenJoins), DEFAULT_CHANNEL_CAPACITY)
    }
}

impl DeliveryReport {
    fn empty(event: EventName, rooms: Vec<String>) -> Self {
        Self {
            event: event.as_str(),
            rooms,
            delivered: 0,
            failed: 0,
        }
    }

    fn record(&mut self, id: ConnectionId, result: Result<(), TrySendError<String>>) {
        match result {
            Ok(()) => self.delivered += 1,
            Err(TrySendError::Full(_)) => {
                self.failed += 1;
                metrics::delivery_failure("full");
                warn!(connection_id = %id, event = self.event, "Outbound queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {
                self.failed += 1;
                metrics::delivery_failure("closed");
                debug!(connection_id = %id, event = self.event, "Connection closed during delivery");
            }
        }
    }
}
