// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;

use sealbox_auth::AuthProtocol;
use sealbox_config::model::GatewayConfig;
use sealbox_core::{PluginAdapter, SealboxError};
use sealbox_delivery::{DeliveryEngine, LivePushRegistry};
use sealbox_identity::IdentityDirectory;
use sealbox_storage::Database;

use crate::auth::require_session;
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
///
/// `adapters` are the pluggable collaborators `/health` reports on.
#[derive(Clone)]
pub struct GatewayState {
    pub db: Database,
    pub directory: IdentityDirectory,
    pub auth: AuthProtocol,
    pub delivery: DeliveryEngine,
    pub push: Arc<LivePushRegistry>,
    pub adapters: Arc<Vec<Arc<dyn PluginAdapter>>>,
}

/// Build the gateway router over shared state.
///
/// - `POST /preauth`, `POST /auth`, `GET /health` are public: they are
///   the way in.
/// - `PUT|POST /message` requires an authenticated session
///   (fail-closed middleware).
/// - `PUT|POST /inbox` authenticates in the handler: it also accepts
///   signature-authenticated federation peers, which needs the raw
///   body bytes.
/// - `GET /ws` authenticates during the handshake, not via middleware.
pub fn router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/preauth", post(handlers::post_preauth))
        .route("/auth", post(handlers::post_auth))
        .with_state(state.clone());

    let inbox_routes = Router::new()
        .route("/inbox", put(handlers::put_inbox).post(handlers::put_inbox))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/message",
            put(handlers::put_message).post(handlers::put_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(inbox_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(CorsLayer::permissive())
}

/// Bind and serve the gateway until the task is aborted.
pub async fn start_server(config: &GatewayConfig, state: GatewayState) -> Result<(), SealboxError> {
    let app = router(state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener =
        tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| SealboxError::Transport {
                message: format!("failed to bind gateway to {addr}"),
                source: Some(Box::new(e)),
            })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| SealboxError::Transport {
            message: "gateway server error".to_string(),
            source: Some(Box::new(e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::PreauthResponse;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use sealbox_auth::LocalCredentialIssuer;
    use sealbox_config::model::{AuthConfig, DeliveryConfig};
    use sealbox_core::types::{Direction, Envelope, Identity, Session};
    use sealbox_delivery::federation::{PERMALINK_HEADER, SIGNATURE_HEADER};
    use sealbox_identity::NodeKeypair;
    use sealbox_storage::queries::messages;
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn state(dir: &tempfile::TempDir) -> GatewayState {
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let directory = IdentityDirectory::new(db.clone());
        let auth_config = AuthConfig::default();
        let issuer = Arc::new(LocalCredentialIssuer::new(auth_config.clone()));
        let auth = AuthProtocol::new(db.clone(), directory.clone(), issuer.clone(), auth_config);
        let push = Arc::new(LivePushRegistry::new());
        let delivery = DeliveryEngine::new(
            db.clone(),
            directory.clone(),
            push.clone(),
            DeliveryConfig::default(),
        )
        .unwrap();
        let adapters: Arc<Vec<Arc<dyn PluginAdapter>>> =
            Arc::new(vec![push.clone(), issuer]);
        GatewayState {
            db,
            directory,
            auth,
            delivery,
            push,
            adapters,
        }
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn authed_request(
        method: &str,
        uri: &str,
        client_id: &str,
        token: &str,
        body: serde_json::Value,
    ) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-client-id", client_id)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn envelope(author: &str, recipient: &str, time: i64, body: &str) -> Envelope {
        let mut env = Envelope {
            author: author.to_string(),
            recipient: recipient.to_string(),
            link: String::new(),
            payload_link: format!("pl-{body}"),
            context: None,
            time,
            object: serde_json::json!({"body": body}),
        };
        env.link = env.compute_link();
        env
    }

    /// Runs /preauth and /auth for a fresh keypair; returns the
    /// session token.
    async fn handshake(app: &Router, client_id: &str, permalink: &str) -> String {
        let kp = NodeKeypair::generate();
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/preauth",
                serde_json::json!({
                    "clientId": client_id,
                    "identity": {
                        "permalink": permalink,
                        "pub": kp.public_hex(),
                    },
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let preauth: PreauthResponse = body_json(response).await;

        let signature = hex::encode(kp.sign(preauth.challenge.as_bytes()).to_bytes());
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/auth",
                serde_json::json!({
                    "clientId": client_id,
                    "signature": signature,
                    "time": sealbox_core::now_ms(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let session: Session = body_json(response).await;
        assert!(session.authenticated);
        session.session_token.unwrap()
    }

    /// Registers a peer identity and returns a signed /inbox request
    /// for the given body.
    async fn peer_request(
        s: &GatewayState,
        kp: &NodeKeypair,
        permalink: &str,
        signing_key: &NodeKeypair,
        body: String,
    ) -> Request<Body> {
        s.directory
            .register(&Identity {
                permalink: permalink.to_string(),
                pub_key: kp.public_hex(),
                endpoint: None,
                metadata: None,
                created_at: 0,
            })
            .await
            .unwrap();
        let signature = hex::encode(signing_key.sign(body.as_bytes()).to_bytes());
        Request::builder()
            .method("POST")
            .uri("/inbox")
            .header("content-type", "application/json")
            .header(PERMALINK_HEADER, permalink)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public_and_reports_adapters() {
        let dir = tempdir().unwrap();
        let app = router(state(&dir).await);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["adapters"]["live-push"], "healthy");
        assert_eq!(body["adapters"]["local-credentials"], "healthy");
    }

    #[tokio::test]
    async fn full_handshake_then_message_submission() {
        let dir = tempdir().unwrap();
        let app = router(state(&dir).await);
        let token = handshake(&app, "c-alice", "perma-alice").await;

        // No transport for the recipient: the message queues.
        let env = envelope("perma-alice", "perma-bob", 100, "hello");
        let response = app
            .oneshot(authed_request(
                "POST",
                "/message",
                "c-alice",
                &token,
                serde_json::json!({"message": env}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result: sealbox_core::types::DeliveryResult = body_json(response).await;
        assert!(result.queued);
        assert!(result.delivered.is_empty());
    }

    #[tokio::test]
    async fn wrong_signature_is_rejected_with_401() {
        let dir = tempdir().unwrap();
        let app = router(state(&dir).await);
        let kp = NodeKeypair::generate();
        let intruder = NodeKeypair::generate();

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/preauth",
                serde_json::json!({
                    "clientId": "c1",
                    "identity": {"permalink": "perma-a", "pub": kp.public_hex()},
                }),
            ))
            .await
            .unwrap();
        let preauth: PreauthResponse = body_json(response).await;

        let signature = hex::encode(intruder.sign(preauth.challenge.as_bytes()).to_bytes());
        let response = app
            .oneshot(json_request(
                "POST",
                "/auth",
                serde_json::json!({
                    "clientId": "c1",
                    "signature": signature,
                    "time": sealbox_core::now_ms(),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let err: crate::handlers::ErrorResponse = body_json(response).await;
        assert!(err.error.contains("handshake failed"));
    }

    #[tokio::test]
    async fn authenticated_routes_fail_closed() {
        let dir = tempdir().unwrap();
        let app = router(state(&dir).await);

        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/message",
                serde_json::json!({"message": {}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(authed_request(
                "POST",
                "/inbox",
                "ghost",
                "bad-token",
                serde_json::json!({"messages": []}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_peer_post_lands_in_the_inbox() {
        let dir = tempdir().unwrap();
        let s = state(&dir).await;
        let app = router(s.clone());

        let kp = NodeKeypair::generate();
        let env = envelope("perma-peer", "perma-alice", 100, "federated");
        let body = serde_json::json!({"messages": [env.clone()]}).to_string();
        let request = peer_request(&s, &kp, "perma-peer", &kp, body).await;

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let stored = messages::find(&s.db, messages::MessageQuery::new(Direction::Inbound))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].link, env.link);
    }

    #[tokio::test]
    async fn peer_post_with_wrong_key_is_rejected() {
        let dir = tempdir().unwrap();
        let s = state(&dir).await;
        let app = router(s.clone());

        let kp = NodeKeypair::generate();
        let intruder = NodeKeypair::generate();
        let env = envelope("perma-peer", "perma-alice", 100, "forged");
        let body = serde_json::json!({"messages": [env]}).to_string();
        let request = peer_request(&s, &kp, "perma-peer", &intruder, body).await;

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // An unknown permalink is rejected too.
        let stranger = NodeKeypair::generate();
        let body = serde_json::json!({"messages": []}).to_string();
        let signature = hex::encode(stranger.sign(body.as_bytes()).to_bytes());
        let request = Request::builder()
            .method("POST")
            .uri("/inbox")
            .header("content-type", "application/json")
            .header(PERMALINK_HEADER, "perma-nobody")
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let stored = messages::find(&s.db, messages::MessageQuery::new(Direction::Inbound))
            .await
            .unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_invalid_inbox_messages_are_skipped() {
        let dir = tempdir().unwrap();
        let s = state(&dir).await;
        let app = router(s.clone());
        let token = handshake(&app, "c-alice", "perma-alice").await;

        let env = envelope("perma-bob", "perma-alice", 100, "once");
        let mut forged = envelope("perma-bob", "perma-alice", 200, "forged");
        forged.link = "not-the-content-hash".to_string();
        let response = app
            .oneshot(authed_request(
                "PUT",
                "/inbox",
                "c-alice",
                &token,
                serde_json::json!({
                    "messages": [
                        env.clone(),
                        env.clone(),
                        forged,
                        serde_json::json!({"junk": true}),
                    ],
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Exactly one row made it in.
        let stored = messages::find(&s.db, messages::MessageQuery::new(Direction::Inbound))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].link, env.link);
    }
}
