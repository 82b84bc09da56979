// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles the handshake rounds (/preauth, /auth), batch inbox intake
//! (/inbox), and outbound message submission (/message).

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use sealbox_auth::ChallengeResponse;
use sealbox_core::types::{Direction, Envelope, Identity, Position, Session};
use sealbox_core::{HealthStatus, SealboxError};
use sealbox_storage::queries::messages;

use crate::server::GatewayState;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_status(e: &SealboxError) -> StatusCode {
    match e {
        SealboxError::HandshakeFailed(_)
        | SealboxError::InvalidSignature(_)
        | SealboxError::ClockDrift { .. } => StatusCode::UNAUTHORIZED,
        SealboxError::NotFound(_) => StatusCode::NOT_FOUND,
        SealboxError::InvalidMessageFormat(_) => StatusCode::BAD_REQUEST,
        SealboxError::Duplicate { .. } => StatusCode::CONFLICT,
        SealboxError::Config(_) | SealboxError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        SealboxError::Storage { .. }
        | SealboxError::PutFailed(_)
        | SealboxError::BatchPutFailed(_)
        | SealboxError::Transport { .. }
        | SealboxError::Ledger { .. }
        | SealboxError::Timeout { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(e: SealboxError) -> Response {
    let status = error_status(&e);
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

/// Request body for POST /preauth.
#[derive(Debug, Deserialize)]
pub struct PreauthRequest {
    #[serde(rename = "clientId")]
    pub client_id: String,
    pub identity: Identity,
}

/// Response body for POST /preauth: flattened credentials plus the
/// challenge to sign.
#[derive(Debug, Serialize, Deserialize)]
pub struct PreauthResponse {
    pub endpoint: String,
    pub region: String,
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    pub challenge: String,
    pub time: i64,
}

/// POST /preauth
///
/// Registers (or refreshes) the claimed identity and opens the first
/// handshake round.
pub async fn post_preauth(
    State(state): State<GatewayState>,
    Json(body): Json<PreauthRequest>,
) -> Response {
    if let Err(e) = state.directory.register(&body.identity).await {
        return error_response(e);
    }
    match state
        .auth
        .pre_authenticate(&body.client_id, &body.identity.permalink)
        .await
    {
        Ok(temp) => Json(PreauthResponse {
            endpoint: temp.credentials.endpoint,
            region: temp.credentials.region,
            access_key: temp.credentials.access_key,
            secret_key: temp.credentials.secret_key,
            session_token: temp.credentials.session_token,
            challenge: temp.challenge,
            time: temp.time,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// Request body for POST /auth.
///
/// `permalink` and `challenge` are accepted for wire compatibility but
/// the server trusts only its stored challenge for the client.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(rename = "clientId")]
    pub client_id: String,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default)]
    pub challenge: Option<String>,
    pub signature: String,
    pub time: i64,
    #[serde(default)]
    pub position: Option<Position>,
}

/// POST /auth
///
/// Second handshake round; 401 with the rejection reason on failure.
pub async fn post_auth(State(state): State<GatewayState>, Json(body): Json<AuthRequest>) -> Response {
    let response = ChallengeResponse {
        signature: body.signature,
        time: body.time,
        position: body.position,
    };
    match state.auth.authenticate(&body.client_id, &response).await {
        Ok(session) => Json::<Session>(session).into_response(),
        Err(e) => error_response(e),
    }
}

/// Request body for PUT|POST /inbox.
#[derive(Debug, Deserialize)]
pub struct InboxRequest {
    pub messages: Vec<serde_json::Value>,
}

/// PUT|POST /inbox
///
/// Stores a batch of inbound envelopes. Authorized for clients with a
/// session and for federated peers signing the body bytes; the
/// signature check needs the raw body, so this route does its own
/// authentication instead of the session middleware. Malformed and
/// duplicate messages are skipped without aborting the rest of the
/// batch; storage faults abort and surface.
pub async fn put_inbox(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    raw_body: Bytes,
) -> Response {
    if !crate::auth::inbox_authorized(&state, &headers, &raw_body).await {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let body: InboxRequest = match serde_json::from_slice(&raw_body) {
        Ok(body) => body,
        Err(e) => {
            return error_response(SealboxError::InvalidMessageFormat(format!(
                "inbox body: {e}"
            )));
        }
    };
    for raw in body.messages {
        let envelope: Envelope = match serde_json::from_value(raw) {
            Ok(env) => env,
            Err(e) => {
                warn!(error = %e, "skipping undecodable inbox message");
                continue;
            }
        };
        if let Err(e) = envelope.validate() {
            warn!(link = %envelope.link, error = %e, "skipping invalid inbox message");
            continue;
        }
        match messages::put_message(&state.db, Direction::Inbound, &envelope).await {
            Ok(_) => {}
            Err(e) if e.is_duplicate() => {
                warn!(link = %envelope.link, "skipping duplicate inbox message");
            }
            Err(e) => return error_response(e),
        }
    }
    Json(serde_json::json!({})).into_response()
}

/// Request body for PUT|POST /message.
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub message: Envelope,
}

/// PUT|POST /message
///
/// Stores an outbound envelope and attempts delivery immediately.
/// A duplicate store is success: the delivery attempt proceeds, and
/// the engine's idempotent bookkeeping makes the retry harmless.
pub async fn put_message(
    State(state): State<GatewayState>,
    Json(body): Json<MessageRequest>,
) -> Response {
    let envelope = body.message;
    if let Err(e) = envelope.validate() {
        return error_response(e);
    }
    match messages::put_message(&state.db, Direction::Outbound, &envelope).await {
        Ok(_) => {}
        Err(e) if e.is_duplicate() => {}
        Err(e) => return error_response(e),
    }
    match state
        .delivery
        .deliver_batch(&envelope.recipient, std::slice::from_ref(&envelope))
        .await
    {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /health
///
/// Public liveness plus a health check per registered adapter. Any
/// non-healthy adapter degrades the response to 503.
pub async fn get_health(State(state): State<GatewayState>) -> Response {
    let mut adapters = serde_json::Map::new();
    let mut healthy = true;
    for adapter in state.adapters.iter() {
        let label = match adapter.health_check().await {
            Ok(HealthStatus::Healthy) => "healthy",
            Ok(HealthStatus::Degraded(_)) => {
                healthy = false;
                "degraded"
            }
            Ok(HealthStatus::Unhealthy(_)) | Err(_) => {
                healthy = false;
                "unhealthy"
            }
        };
        adapters.insert(adapter.name().to_string(), label.into());
    }
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({
            "status": if healthy { "ok" } else { "degraded" },
            "adapters": adapters,
        })),
    )
        .into_response()
}
