//! WebSocket transport for the router.
//!
//! The handshake is checked in a fixed order: method allow-list (405), then
//! origin allow-list (403), then the token when the join policy needs one
//! (401). Only then is the connection upgraded and registered.

use crate::auth::{Identity, TokenVerifier};
use crate::error::{RealtimeError, RealtimeResult};
use crate::router::{ConnectionId, RoomRouter};
use admit_config::RealtimeConfig;
use admit_core::{AdmitError, ErrorResponse};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Query parameters accepted on the handshake.
#[derive(Debug, Default, Deserialize)]
pub struct HandshakeParams {
    pub token: Option<String>,
}

/// Accepts WebSocket connections and hands them to a [`RoomRouter`].
#[derive(Clone)]
pub struct RealtimeServer {
    router: RoomRouter,
    config: Arc<RealtimeConfig>,
    verifier: Option<TokenVerifier>,
}

impl RealtimeServer {
    /// Binds the router to the handshake policy in `config`.
    ///
    /// `verifier` is required when the router's join policy needs an identity.
    pub fn start(
        router: RoomRouter,
        config: RealtimeConfig,
        verifier: Option<TokenVerifier>,
    ) -> RealtimeResult<Self> {
        if router.requires_identity() && verifier.is_none() {
            return Err(RealtimeError::Unauthorized(
                "Authenticated joins need a token verifier".to_string(),
            ));
        }

        info!(
            path = %config.path,
            origins = ?config.allowed_origins,
            methods = ?config.allowed_methods,
            "Realtime server ready"
        );

        Ok(Self {
            router,
            config: Arc::new(config),
            verifier,
        })
    }

    #[must_use]
    pub fn router(&self) -> &RoomRouter {
        &self.router
    }

    #[must_use]
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Routes serving the WebSocket endpoint.
    pub fn routes<S>(&self) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        Router::new()
            .route(&self.config.path, any(ws_handler))
            .with_state(self.clone())
    }

    /// Checks method, origin and credentials of a handshake.
    ///
    /// Credentials are only read when the join policy needs an identity.
    pub fn check_handshake(
        &self,
        method: &Method,
        headers: &HeaderMap,
        params: &HandshakeParams,
    ) -> RealtimeResult<Option<Identity>> {
        if !self.config.is_method_allowed(method.as_str()) {
            return Err(RealtimeError::MethodNotAllowed(method.to_string()));
        }

        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok());
        let origin_ok = match origin {
            Some(origin) => self.config.is_origin_allowed(origin),
            None => self.config.allowed_origins.iter().any(|o| o == "*"),
        };
        if !origin_ok {
            return Err(RealtimeError::ConnectionRejected(
                origin.unwrap_or("<none>").to_string(),
            ));
        }

        // Open joins never look at credentials, including foreign ones.
        if !self.router.requires_identity() {
            return Ok(None);
        }

        let token = params
            .token
            .clone()
            .or_else(|| bearer_token(headers))
            .ok_or_else(|| RealtimeError::Unauthorized("Missing handshake token".to_string()))?;
        match &self.verifier {
            Some(verifier) => verifier.verify(&token).map(Some),
            None => Err(RealtimeError::Unauthorized(
                "No token verifier configured".to_string(),
            )),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

impl IntoResponse for RealtimeError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse::from_error(&AdmitError::from(self));
        (status, Json(body)).into_response()
    }
}

async fn ws_handler(
    State(server): State<RealtimeServer>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<HandshakeParams>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let identity = match server.check_handshake(&method, &headers, &params) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(error = %e, "Realtime handshake rejected");
            return e.into_response();
        }
    };

    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, server.router, identity)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn handle_socket(socket: WebSocket, router: RoomRouter, identity: Option<Identity>) {
    let (id, outbound) = router.connect(identity);
    let (sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(forward_frames(outbound, sender, id));

    let inbound_router = router.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    inbound_router.handle_client_message(id, &text);
                }
                Ok(Message::Close(_)) => {
                    debug!(connection_id = %id, "Client sent close frame");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(connection_id = %id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    router.disconnect(id);
}

async fn forward_frames(
    mut outbound: mpsc::Receiver<String>,
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    id: ConnectionId,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = sender.send(Message::Text(frame)).await {
            debug!(connection_id = %id, error = %e, "Failed to write frame, closing connection");
            return;
        }
    }
    let _ = sender.send(Message::Close(None)).await;
}
