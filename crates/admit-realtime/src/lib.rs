//! # Admit Realtime
//!
//! Fans server-side state changes out to the WebSocket connections that have
//! joined the matching rooms. A student's case is visible to the student,
//! the assigned agent, the assigned staff member and every admin, so each
//! domain broadcast targets up to four rooms. Delivery is best-effort and
//! fire-and-forget: nothing is queued, acknowledged or replayed.

pub mod auth;
pub mod error;
pub mod events;
pub mod metrics;
pub mod protocol;
pub mod room;
mod router;
mod server;

pub use auth::{authorizer_for, Identity, JoinAuthorizer, OpenJoins, SessionJoins, TokenVerifier};
pub use error::{RealtimeError, RealtimeResult};
pub use events::{
    CaseEvent, DocumentUpdate, EntityId, EventName, Notification, PaymentUpdate, ProfileUpdate,
    WorkflowUpdate,
};
pub use protocol::{ClientMessage, JoinRequest, ServerMessage};
pub use room::{Role, Room};
pub use router::{ConnectionId, DeliveryReport, RoomRouter, RouterStats};
pub use server::{HandshakeParams, RealtimeServer};
