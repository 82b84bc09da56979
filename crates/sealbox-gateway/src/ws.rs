// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler for the live push channel.
//!
//! Server -> Client: `{"messages":[...]}` frames, the payload the
//! delivery engine published to `{clientId}/message`.
//!
//! Client -> Server (JSON):
//! ```json
//! {"topic": "<clientId>/ack", "payload": {"link": "...", "time": 123}}
//! ```
//! Only ack-topic frames are understood today; anything else is logged
//! and dropped.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use sealbox_core::traits::push::ack_topic;
use sealbox_core::types::Cursor;

use crate::server::GatewayState;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub token: String,
}

/// Inbound frame from the client: a topic plus an optional payload.
#[derive(Debug, Deserialize)]
struct WsIncoming {
    topic: String,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

/// WebSocket upgrade handler.
///
/// Authenticates via query parameters during the handshake: the
/// session must be authenticated and the token must match. Fail-closed.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    let session = match state.auth.session(&params.client_id).await {
        Ok(session) => session,
        Err(e) => {
            warn!(client_id = %params.client_id, error = %e, "ws session lookup failed");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };
    let authorized = session
        .map(|s| s.authenticated && s.session_token.as_deref() == Some(params.token.as_str()))
        .unwrap_or(false);
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let client_id = params.client_id;
    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id))
}

/// Handle one live push connection.
///
/// Attaches the client to the push registry, flips presence on, drains
/// published frames to the socket, and applies inbound acks. Presence
/// flips off when the socket closes, however it closes.
async fn handle_socket(socket: WebSocket, state: GatewayState, client_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut rx = state.push.attach(&client_id);
    if let Err(e) = state.auth.update_presence(&client_id, true).await {
        warn!(client_id, error = %e, "failed to mark client connected");
    }
    debug!(client_id, "live push channel open");

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender
                .send(Message::Text(frame.payload.into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    let expected_ack = ack_topic(&client_id);
    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let incoming: WsIncoming = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(client_id, error = %e, "undecodable ws frame");
                        continue;
                    }
                };
                if incoming.topic != expected_ack {
                    debug!(client_id, topic = %incoming.topic, "ignoring unknown ws topic");
                    continue;
                }
                let cursor = incoming
                    .payload
                    .and_then(|p| serde_json::from_value::<Cursor>(p).ok());
                if let Some(cursor) = cursor {
                    match state.delivery.ack(&client_id, cursor).await {
                        Ok(advanced) => {
                            debug!(client_id, advanced, "ack applied");
                        }
                        Err(e) => {
                            warn!(client_id, error = %e, "ack failed");
                        }
                    }
                }
            }
            Message::Close(_) => break,
            // Binary, ping, pong: nothing to do.
            _ => {}
        }
    }

    state.push.detach(&client_id);
    if let Err(e) = state.auth.update_presence(&client_id, false).await {
        warn!(client_id, error = %e, "failed to mark client disconnected");
    }
    sender_task.abort();
    debug!(client_id, "live push channel closed");
}
