// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request authentication for the gateway.
//!
//! Client requests carry `x-client-id` plus
//! `Authorization: Bearer <session_token>` matching an authenticated
//! session. The inbox route additionally accepts federated peers: a
//! detached signature over the exact body bytes, verified against the
//! peer's registered identity. Anything else is rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use sealbox_delivery::federation::{PERMALINK_HEADER, SIGNATURE_HEADER};
use sealbox_identity::verify_detached;

use crate::server::GatewayState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    header(headers, "authorization").and_then(|v| v.strip_prefix("Bearer "))
}

async fn valid_session(state: &GatewayState, client_id: &str, token: &str) -> bool {
    match state.auth.session(client_id).await {
        Ok(Some(s)) => s.authenticated && s.session_token.as_deref() == Some(token),
        _ => false,
    }
}

/// Dual-mode authorization for the inbox route: a signed peer request,
/// or an authenticated client session.
pub(crate) async fn inbox_authorized(
    state: &GatewayState,
    headers: &HeaderMap,
    body: &[u8],
) -> bool {
    if let (Some(permalink), Some(signature)) = (
        header(headers, PERMALINK_HEADER),
        header(headers, SIGNATURE_HEADER),
    ) {
        return match state.directory.by_permalink(permalink).await {
            Ok(Some(identity)) => verify_detached(&identity.pub_key, body, signature).is_ok(),
            _ => {
                debug!(permalink, "rejecting post from unknown peer");
                false
            }
        };
    }
    if let (Some(client_id), Some(token)) = (header(headers, "x-client-id"), bearer(headers)) {
        return valid_session(state, client_id, token).await;
    }
    false
}

pub async fn require_session(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let client_id = header(request.headers(), "x-client-id");
    let token = bearer(request.headers());

    let (Some(client_id), Some(token)) = (client_id, token) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    if valid_session(&state, client_id, token).await {
        Ok(next.run(request).await)
    } else {
        debug!(client_id, "rejecting request without a valid session");
        Err(StatusCode::UNAUTHORIZED)
    }
}
