// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end scenarios over the full node stack.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use sealbox_core::types::{Cursor, Direction, Identity};
use sealbox_core::{PluginAdapter, SealboxError, now_ms};
use sealbox_gateway::{GatewayState, router};
use sealbox_storage::MessageQuery;
use sealbox_storage::queries::{messages, sessions};
use sealbox_test_utils::{TestHarness, envelope};
use tower::ServiceExt;

fn gateway(harness: &TestHarness) -> axum::Router {
    let adapters: Arc<Vec<Arc<dyn PluginAdapter>>> = Arc::new(vec![harness.push.clone()]);
    router(GatewayState {
        db: harness.db.clone(),
        directory: harness.directory.clone(),
        auth: harness.auth.clone(),
        delivery: harness.delivery.clone(),
        push: harness.push.clone(),
        adapters,
    })
}

#[tokio::test]
async fn handshake_succeeds_once_and_rejects_replay() {
    let harness = TestHarness::builder().build().await.unwrap();
    let kp = harness.register_identity("perma-alice").await.unwrap();

    let temp = harness
        .auth
        .pre_authenticate("c-alice", "perma-alice")
        .await
        .unwrap();
    let response = sealbox_auth::ChallengeResponse {
        signature: hex::encode(kp.sign(temp.challenge.as_bytes()).to_bytes()),
        time: now_ms(),
        position: None,
    };

    let session = harness.auth.authenticate("c-alice", &response).await.unwrap();
    assert!(session.authenticated);
    assert!(session.session_token.is_some());

    // The consumed challenge cannot be replayed.
    let err = harness
        .auth
        .authenticate("c-alice", &response)
        .await
        .unwrap_err();
    assert!(matches!(err, SealboxError::HandshakeFailed(_)));
}

#[tokio::test]
async fn duplicate_in_an_inbox_batch_is_skipped_not_fatal() {
    let harness = TestHarness::builder().build().await.unwrap();
    let kp = harness.register_identity("perma-alice").await.unwrap();
    let session = harness.handshake("c-alice", "perma-alice", &kp).await.unwrap();
    let token = session.session_token.unwrap();
    let app = gateway(&harness);

    let env = envelope("perma-bob", "perma-alice", 100, "only-once");
    let request = Request::builder()
        .method("PUT")
        .uri("/inbox")
        .header("content-type", "application/json")
        .header("x-client-id", "c-alice")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(
            serde_json::json!({"messages": [env.clone(), env.clone()]}).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let stored = messages::find(&harness.db, MessageQuery::new(Direction::Inbound))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].link, env.link);
}

/// Serve a harness's full router on a real socket; returns the bound
/// address.
async fn spawn_node(harness: &TestHarness) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = gateway(harness);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn federated_message_crosses_nodes_into_the_peer_inbox() {
    let receiver = TestHarness::builder().build().await.unwrap();
    let addr = spawn_node(&receiver).await;

    // The sender signs federated posts as perma-node-a; the receiver
    // verifies the signature against its directory entry for that
    // permalink.
    let node_kp = sealbox_identity::NodeKeypair::generate();
    let sender = TestHarness::builder()
        .with_delivery_config(sealbox_config::model::DeliveryConfig {
            federation_permalink: Some("perma-node-a".to_string()),
            federation_secret_key: Some(hex::encode(node_kp.private_bytes())),
            ..Default::default()
        })
        .build()
        .await
        .unwrap();
    receiver
        .directory
        .register(&Identity {
            permalink: "perma-node-a".to_string(),
            pub_key: node_kp.public_hex(),
            endpoint: None,
            metadata: None,
            created_at: 0,
        })
        .await
        .unwrap();
    sender
        .register_identity_with_endpoint("perma-bob", Some(&format!("http://{addr}/inbox")))
        .await
        .unwrap();

    let env = envelope("perma-node-a", "perma-bob", 100, "cross-node");
    messages::put_message(&sender.db, Direction::Outbound, &env)
        .await
        .unwrap();
    let result = sender
        .delivery
        .deliver_batch("perma-bob", std::slice::from_ref(&env))
        .await
        .unwrap();
    assert_eq!(result.delivered, vec![env.link.clone()]);
    assert!(messages::undelivered(&sender.db, 10).await.unwrap().is_empty());

    let stored = messages::find(&receiver.db, MessageQuery::new(Direction::Inbound))
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].link, env.link);
}

#[tokio::test]
async fn unsigned_federation_post_is_rejected_and_stays_queued() {
    let receiver = TestHarness::builder().build().await.unwrap();
    let addr = spawn_node(&receiver).await;

    // No federation identity configured: the post goes out unsigned
    // and the receiver turns it away.
    let sender = TestHarness::builder().build().await.unwrap();
    sender
        .register_identity_with_endpoint("perma-bob", Some(&format!("http://{addr}/inbox")))
        .await
        .unwrap();

    let env = envelope("perma-node-a", "perma-bob", 100, "anonymous");
    messages::put_message(&sender.db, Direction::Outbound, &env)
        .await
        .unwrap();
    let result = sender
        .delivery
        .deliver_batch("perma-bob", std::slice::from_ref(&env))
        .await
        .unwrap();
    assert!(result.delivered.is_empty());
    assert_eq!(result.failed, vec![env.link.clone()]);
    assert!(result.error.is_some());

    // Still queued for the sweep; nothing landed on the peer.
    assert_eq!(messages::undelivered(&sender.db, 10).await.unwrap().len(), 1);
    let stored = messages::find(&receiver.db, MessageQuery::new(Direction::Inbound))
        .await
        .unwrap();
    assert!(stored.is_empty());
}

#[tokio::test]
async fn seal_lifecycle_produces_watch_wrote_confirm_topics() {
    let harness = TestHarness::builder().build().await.unwrap();
    let mut rx = harness.bus.subscribe();

    harness.seals.watch("pl-1", "addr-1").await.unwrap();
    harness.replicator.run_once(100).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().topic, "seal:watch");

    let report = harness.seals.seal_pending(None).await.unwrap();
    assert_eq!(report.processed, 1);
    harness.replicator.run_once(100).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().topic, "seal:wrote");

    let txid = harness
        .seals
        .get("pl-1", "addr-1")
        .await
        .unwrap()
        .unwrap()
        .txid
        .unwrap();
    harness.ledger.set_confirmations(&txid, 2);
    harness.seals.sync_unconfirmed(None).await.unwrap();
    harness.replicator.run_once(100).await.unwrap();
    assert_eq!(rx.recv().await.unwrap().topic, "seal:confirm");

    let record = harness.seals.get("pl-1", "addr-1").await.unwrap().unwrap();
    assert_eq!(record.confirmations, 2);
    assert!(record.confirm_time.is_some());
}

mod ack_monotonicity {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// The sent checkpoint only ever moves forward, whatever order
        /// acks arrive in.
        #[test]
        fn checkpoint_never_moves_backward(times in prop::collection::vec(1i64..10_000, 1..40)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async move {
                let harness = TestHarness::builder().build().await.unwrap();
                sessions::put_challenge(&harness.db, "c1", "perma-a", "ch")
                    .await
                    .unwrap();
                sessions::authenticate_session(&harness.db, "c1", "token", None)
                    .await
                    .unwrap();

                let mut high_water = 0i64;
                for time in times {
                    let advanced = harness
                        .delivery
                        .ack("c1", Cursor { link: format!("l-{time}"), time })
                        .await
                        .unwrap();
                    prop_assert_eq!(advanced, time > high_water);
                    high_water = high_water.max(time);

                    let session = sessions::get_session(&harness.db, "c1")
                        .await
                        .unwrap()
                        .unwrap();
                    let sent = session
                        .server_position
                        .and_then(|p| p.sent)
                        .expect("checkpoint exists after first ack");
                    prop_assert_eq!(sent.time, high_water);
                }
                Ok(())
            })?;
        }
    }
}
