// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The delivery engine: transport selection, acks, and the retry sweep.
//!
//! Transport order for a recipient: a live push session always wins;
//! otherwise a federated HTTP endpoint from the directory; otherwise
//! the batch stays queued in the outbox for the next sweep. Delivery is
//! at-least-once end to end, with the recipient deduplicating by link.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use sealbox_config::model::DeliveryConfig;
use sealbox_core::traits::push::message_topic;
use sealbox_core::types::{Cursor, DeliveryResult, Envelope};
use sealbox_core::{PushTransport, SealboxError, now_ms};
use sealbox_identity::IdentityDirectory;
use sealbox_storage::Database;
use sealbox_storage::queries::{messages, sessions};

use crate::federation::FederationClient;

/// Delivers stored outbox envelopes to their recipients.
#[derive(Clone)]
pub struct DeliveryEngine {
    db: Database,
    directory: IdentityDirectory,
    push: Arc<dyn PushTransport>,
    federation: FederationClient,
    config: DeliveryConfig,
}

impl DeliveryEngine {
    pub fn new(
        db: Database,
        directory: IdentityDirectory,
        push: Arc<dyn PushTransport>,
        config: DeliveryConfig,
    ) -> Result<Self, SealboxError> {
        let federation = FederationClient::new(&config)?;
        Ok(Self {
            db,
            directory,
            push,
            federation,
            config,
        })
    }

    /// Deliver a batch of outbox envelopes to one recipient permalink.
    ///
    /// Envelopes are delivered in ascending time order. Along the HTTP
    /// path the first failure stops the batch; everything already sent
    /// stays delivered, and the remainder is reported as failed and
    /// left for the retry sweep.
    pub async fn deliver_batch(
        &self,
        permalink: &str,
        envelopes: &[Envelope],
    ) -> Result<DeliveryResult, SealboxError> {
        let mut batch = envelopes.to_vec();
        batch.sort_by_key(|e| e.time);
        if batch.is_empty() {
            return Ok(DeliveryResult::default());
        }

        let mut push_error = None;
        if let Some(session) = sessions::live_session_by_permalink(&self.db, permalink).await? {
            let payload = serde_json::to_string(&serde_json::json!({ "messages": batch }))
                .map_err(|e| SealboxError::Internal(e.to_string()))?;
            match self
                .push
                .publish(&message_topic(&session.client_id), &payload)
                .await
            {
                Ok(()) => {
                    let mut delivered = Vec::with_capacity(batch.len());
                    for env in &batch {
                        messages::mark_delivered(&self.db, &env.recipient, &env.link, now_ms())
                            .await?;
                        delivered.push(env.link.clone());
                    }
                    debug!(permalink, count = delivered.len(), "delivered via live push");
                    return Ok(DeliveryResult {
                        delivered,
                        ..DeliveryResult::default()
                    });
                }
                Err(e) => {
                    // The session row said live but the channel is gone;
                    // presence lags the socket. Fall through.
                    warn!(permalink, error = %e, "live push failed, falling back");
                    push_error = Some(e.to_string());
                }
            }
        }

        let endpoint = self
            .directory
            .by_permalink(permalink)
            .await?
            .and_then(|identity| identity.endpoint);
        if let Some(endpoint) = endpoint {
            return self.deliver_federated(&endpoint, &batch).await;
        }

        debug!(permalink, count = batch.len(), "no transport, batch stays queued");
        Ok(DeliveryResult {
            queued: true,
            error: push_error,
            ..DeliveryResult::default()
        })
    }

    async fn deliver_federated(
        &self,
        endpoint: &str,
        batch: &[Envelope],
    ) -> Result<DeliveryResult, SealboxError> {
        let mut result = DeliveryResult::default();
        for (i, env) in batch.iter().enumerate() {
            match self.federation.post_message(endpoint, env).await {
                Ok(()) => {
                    messages::mark_delivered(&self.db, &env.recipient, &env.link, now_ms())
                        .await?;
                    result.delivered.push(env.link.clone());
                }
                Err(e) => {
                    let message = e.to_string();
                    messages::mark_delivery_error(&self.db, &env.recipient, &env.link, &message)
                        .await?;
                    result.failed = batch[i..].iter().map(|e| e.link.clone()).collect();
                    result.error = Some(message);
                    break;
                }
            }
        }
        Ok(result)
    }

    /// Apply a client acknowledgement to its session checkpoint.
    ///
    /// Monotonic: a late ack for an older message returns false and
    /// writes nothing.
    pub async fn ack(&self, client_id: &str, cursor: Cursor) -> Result<bool, SealboxError> {
        sessions::advance_sent_checkpoint(&self.db, client_id, cursor).await
    }

    /// Permanently reject an outbox envelope; it leaves the retry sweep.
    pub async fn reject(
        &self,
        recipient: &str,
        link: &str,
        reason: &str,
    ) -> Result<(), SealboxError> {
        warn!(recipient, link, reason, "rejecting outbox message");
        messages::mark_rejected(&self.db, recipient, link, reason).await
    }

    /// Sweep undelivered outbox envelopes and re-attempt delivery,
    /// grouped by recipient in ascending time order.
    ///
    /// Stops issuing new batches once `deadline` passes; whatever is
    /// left stays queued for the next sweep.
    pub async fn retry_failed(
        &self,
        deadline: Option<Instant>,
    ) -> Result<DeliveryResult, SealboxError> {
        let pending = messages::undelivered(&self.db, self.config.retry_batch as i64).await?;
        if pending.is_empty() {
            return Ok(DeliveryResult::default());
        }

        // Group by recipient, preserving ascending time within groups.
        let mut groups: Vec<(String, Vec<Envelope>)> = Vec::new();
        for env in pending {
            match groups.iter_mut().find(|(r, _)| *r == env.recipient) {
                Some((_, batch)) => batch.push(env),
                None => groups.push((env.recipient.clone(), vec![env])),
            }
        }

        let mut total = DeliveryResult::default();
        for (recipient, batch) in groups {
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    debug!(recipient, "retry sweep out of budget");
                    total.queued = true;
                    break;
                }
            }
            let result = self.deliver_batch(&recipient, &batch).await?;
            total.delivered.extend(result.delivered);
            total.failed.extend(result.failed);
            total.queued |= result.queued;
            if total.error.is_none() {
                total.error = result.error;
            }
        }
        if !total.delivered.is_empty() {
            info!(
                delivered = total.delivered.len(),
                failed = total.failed.len(),
                "retry sweep complete"
            );
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::LivePushRegistry;
    use sealbox_core::types::{Direction, Identity};
    use tempfile::tempdir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct Harness {
        db: Database,
        directory: IdentityDirectory,
        push: Arc<LivePushRegistry>,
        engine: DeliveryEngine,
    }

    async fn harness(dir: &tempfile::TempDir) -> Harness {
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let directory = IdentityDirectory::new(db.clone());
        let push = Arc::new(LivePushRegistry::new());
        let engine = DeliveryEngine::new(
            db.clone(),
            directory.clone(),
            push.clone(),
            DeliveryConfig::default(),
        )
        .unwrap();
        Harness {
            db,
            directory,
            push,
            engine,
        }
    }

    fn envelope(recipient: &str, time: i64, body: &str) -> Envelope {
        let mut env = Envelope {
            author: "perma-self".to_string(),
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

    async fn store_outbox(db: &Database, envs: &[Envelope]) {
        for env in envs {
            messages::put_message(db, Direction::Outbound, env).await.unwrap();
        }
    }

    async fn live_session(db: &Database, client_id: &str, permalink: &str) {
        sessions::put_challenge(db, client_id, permalink, "ch").await.unwrap();
        sessions::authenticate_session(db, client_id, "token", None)
            .await
            .unwrap();
    }

    async fn register_endpoint(directory: &IdentityDirectory, permalink: &str, endpoint: &str) {
        let kp = sealbox_identity::NodeKeypair::generate();
        directory
            .register(&Identity {
                permalink: permalink.to_string(),
                pub_key: kp.public_hex(),
                endpoint: Some(endpoint.to_string()),
                metadata: None,
                created_at: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn live_push_wins_and_sends_batch_in_time_order() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        let envs = vec![
            envelope("perma-bob", 200, "second"),
            envelope("perma-bob", 100, "first"),
        ];
        store_outbox(&h.db, &envs).await;
        live_session(&h.db, "c-bob", "perma-bob").await;
        let mut rx = h.push.attach("c-bob");

        let result = h.engine.deliver_batch("perma-bob", &envs).await.unwrap();
        assert_eq!(result.delivered.len(), 2);
        assert!(result.failed.is_empty());
        assert!(!result.queued);

        let frame = rx.recv().await.unwrap();
        assert_eq!(frame.topic, "c-bob/message");
        let body: serde_json::Value = serde_json::from_str(&frame.payload).unwrap();
        let pushed: Vec<Envelope> =
            serde_json::from_value(body.get("messages").unwrap().clone()).unwrap();
        assert_eq!(pushed[0].time, 100);
        assert_eq!(pushed[1].time, 200);

        assert!(messages::undelivered(&h.db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_federation_when_push_channel_is_gone() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let envs = vec![envelope("perma-bob", 100, "a")];
        store_outbox(&h.db, &envs).await;
        // Session says connected, but no channel is attached.
        live_session(&h.db, "c-bob", "perma-bob").await;
        register_endpoint(&h.directory, "perma-bob", &format!("{}/inbox", server.uri())).await;

        let result = h.engine.deliver_batch("perma-bob", &envs).await.unwrap();
        assert_eq!(result.delivered.len(), 1);
        assert!(messages::undelivered(&h.db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn federation_failure_stops_the_batch() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let envs = vec![
            envelope("perma-bob", 100, "a"),
            envelope("perma-bob", 200, "b"),
        ];
        store_outbox(&h.db, &envs).await;
        register_endpoint(&h.directory, "perma-bob", &format!("{}/inbox", server.uri())).await;

        let result = h.engine.deliver_batch("perma-bob", &envs).await.unwrap();
        assert!(result.delivered.is_empty());
        assert_eq!(result.failed.len(), 2);
        assert!(result.error.is_some());
        // Everything stays queued for the sweep, with the failure
        // recorded on the first row.
        assert_eq!(messages::undelivered(&h.db, 10).await.unwrap().len(), 2);
        let entry = messages::outbox_entry(&h.db, "perma-bob", &envs[0].link)
            .await
            .unwrap()
            .unwrap();
        assert!(entry.delivery_error.is_some());
        assert_eq!(entry.delivered_at, None);
    }

    #[tokio::test]
    async fn no_transport_leaves_batch_queued_until_retry() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        let envs = vec![envelope("perma-bob", 100, "a")];
        store_outbox(&h.db, &envs).await;

        let result = h.engine.deliver_batch("perma-bob", &envs).await.unwrap();
        assert!(result.queued);
        assert!(result.delivered.is_empty());

        // Client comes online; the sweep picks the message up.
        live_session(&h.db, "c-bob", "perma-bob").await;
        let mut rx = h.push.attach("c-bob");
        let swept = h.engine.retry_failed(None).await.unwrap();
        assert_eq!(swept.delivered.len(), 1);
        assert!(rx.recv().await.is_some());
        assert!(messages::undelivered(&h.db, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn retry_sweep_respects_deadline() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        store_outbox(&h.db, &[envelope("perma-bob", 100, "a")]).await;

        let expired = Instant::now() - std::time::Duration::from_secs(1);
        let result = h.engine.retry_failed(Some(expired)).await.unwrap();
        assert!(result.queued);
        assert!(result.delivered.is_empty());
        assert_eq!(messages::undelivered(&h.db, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ack_advances_checkpoint_monotonically() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        live_session(&h.db, "c-bob", "perma-bob").await;

        assert!(h
            .engine
            .ack("c-bob", Cursor { link: "l2".into(), time: 200 })
            .await
            .unwrap());
        assert!(!h
            .engine
            .ack("c-bob", Cursor { link: "l1".into(), time: 100 })
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn rejected_message_leaves_the_sweep() {
        let dir = tempdir().unwrap();
        let h = harness(&dir).await;
        let env = envelope("perma-bob", 100, "a");
        store_outbox(&h.db, std::slice::from_ref(&env)).await;

        h.engine
            .reject("perma-bob", &env.link, "recipient refused payload")
            .await
            .unwrap();
        let result = h.engine.retry_failed(None).await.unwrap();
        assert!(result.delivered.is_empty());
        assert!(messages::undelivered(&h.db, 10).await.unwrap().is_empty());
        let entry = messages::outbox_entry(&h.db, "perma-bob", &env.link)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            entry.rejected_reason.as_deref(),
            Some("recipient refused payload")
        );
    }
}
