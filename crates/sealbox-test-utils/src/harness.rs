// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full node stack over a temp SQLite
//! database: identity directory, auth protocol, delivery engine with a
//! live push registry, replicator, and a seal tracker backed by
//! [`MockLedger`].

use std::sync::Arc;

use sealbox_auth::{AuthProtocol, ChallengeResponse, LocalCredentialIssuer};
use sealbox_bus::EventBus;
use sealbox_config::model::{AuthConfig, DeliveryConfig, SealConfig};
use sealbox_core::SealboxError;
use sealbox_core::types::{Envelope, Identity, Session};
use sealbox_core::now_ms;
use sealbox_delivery::{DeliveryEngine, LivePushRegistry};
use sealbox_identity::{IdentityDirectory, NodeKeypair};
use sealbox_replicator::Replicator;
use sealbox_seals::SealTracker;
use sealbox_storage::Database;

use crate::mock_ledger::MockLedger;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    auth_config: AuthConfig,
    delivery_config: DeliveryConfig,
    seal_config: SealConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            auth_config: AuthConfig::default(),
            delivery_config: DeliveryConfig::default(),
            seal_config: SealConfig::default(),
        }
    }

    pub fn with_auth_config(mut self, config: AuthConfig) -> Self {
        self.auth_config = config;
        self
    }

    pub fn with_delivery_config(mut self, config: DeliveryConfig) -> Self {
        self.delivery_config = config;
        self
    }

    pub fn with_seal_config(mut self, config: SealConfig) -> Self {
        self.seal_config = config;
        self
    }

    /// Build the harness, creating all subsystems over a fresh temp DB.
    pub async fn build(self) -> Result<TestHarness, SealboxError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| SealboxError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let directory = IdentityDirectory::new(db.clone());
        let auth = AuthProtocol::new(
            db.clone(),
            directory.clone(),
            Arc::new(LocalCredentialIssuer::new(self.auth_config.clone())),
            self.auth_config,
        );
        let push = Arc::new(LivePushRegistry::new());
        let delivery = DeliveryEngine::new(
            db.clone(),
            directory.clone(),
            push.clone(),
            self.delivery_config,
        )?;
        let bus = EventBus::new();
        let replicator = Replicator::new(db.clone(), bus.clone());
        let ledger = Arc::new(MockLedger::new());
        let seals = SealTracker::new(db.clone(), ledger.clone(), self.seal_config);

        Ok(TestHarness {
            db,
            directory,
            auth,
            push,
            delivery,
            bus,
            replicator,
            ledger,
            seals,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete node stack over a temp database.
pub struct TestHarness {
    pub db: Database,
    pub directory: IdentityDirectory,
    pub auth: AuthProtocol,
    pub push: Arc<LivePushRegistry>,
    pub delivery: DeliveryEngine,
    pub bus: EventBus,
    pub replicator: Replicator,
    pub ledger: Arc<MockLedger>,
    pub seals: SealTracker,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Register a fresh identity under `permalink` and return its
    /// keypair.
    pub async fn register_identity(&self, permalink: &str) -> Result<NodeKeypair, SealboxError> {
        self.register_identity_with_endpoint(permalink, None).await
    }

    /// Register an identity reachable at a federated HTTP endpoint.
    pub async fn register_identity_with_endpoint(
        &self,
        permalink: &str,
        endpoint: Option<&str>,
    ) -> Result<NodeKeypair, SealboxError> {
        let kp = NodeKeypair::generate();
        self.directory
            .register(&Identity {
                permalink: permalink.to_string(),
                pub_key: kp.public_hex(),
                endpoint: endpoint.map(str::to_string),
                metadata: None,
                created_at: 0,
            })
            .await?;
        Ok(kp)
    }

    /// Run the full challenge/response handshake for a registered
    /// identity.
    pub async fn handshake(
        &self,
        client_id: &str,
        permalink: &str,
        kp: &NodeKeypair,
    ) -> Result<Session, SealboxError> {
        let temp = self.auth.pre_authenticate(client_id, permalink).await?;
        let response = ChallengeResponse {
            signature: hex::encode(kp.sign(temp.challenge.as_bytes()).to_bytes()),
            time: now_ms(),
            position: None,
        };
        self.auth.authenticate(client_id, &response).await
    }
}

/// A well-formed envelope with its content link computed.
pub fn envelope(author: &str, recipient: &str, time: i64, body: &str) -> Envelope {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_creates_working_environment() {
        let harness = TestHarness::builder().build().await.unwrap();
        let kp = harness.register_identity("perma-a").await.unwrap();
        let session = harness.handshake("c1", "perma-a", &kp).await.unwrap();
        assert!(session.authenticated);
    }

    #[tokio::test]
    async fn envelope_helper_produces_valid_envelopes() {
        let env = envelope("perma-a", "perma-b", 100, "hello");
        assert!(env.validate().is_ok());
    }

    #[tokio::test]
    async fn temp_db_is_unique_per_harness() {
        let h1 = TestHarness::builder().build().await.unwrap();
        let h2 = TestHarness::builder().build().await.unwrap();
        h1.register_identity("perma-a").await.unwrap();
        assert!(h1.directory.by_permalink("perma-a").await.unwrap().is_some());
        assert!(h2.directory.by_permalink("perma-a").await.unwrap().is_none());
    }
}
