// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Federated HTTP delivery to peer nodes.
//!
//! Posts carry the same `{"messages": [...]}` body the inbox route
//! accepts from clients. When the node has a federation identity
//! configured, each post is signed over the exact body bytes and the
//! peer verifies the signature against this node's directory entry.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use sealbox_config::model::DeliveryConfig;
use sealbox_core::SealboxError;
use sealbox_core::types::Envelope;
use sealbox_identity::NodeKeypair;

pub const PERMALINK_HEADER: &str = "x-sealbox-permalink";
pub const SIGNATURE_HEADER: &str = "x-sealbox-signature";

/// The keypair this node signs outbound federation posts with, plus
/// the permalink peers resolve it under.
#[derive(Debug)]
struct FederationIdentity {
    permalink: String,
    keypair: NodeKeypair,
}

/// HTTP client for posting envelopes to a peer's inbox endpoint.
#[derive(Clone, Debug)]
pub struct FederationClient {
    http: reqwest::Client,
    identity: Option<Arc<FederationIdentity>>,
}

impl FederationClient {
    pub fn new(config: &DeliveryConfig) -> Result<Self, SealboxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| SealboxError::Transport {
                message: "failed to build federation HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        let identity = federation_identity(config)?;
        Ok(Self { http, identity })
    }

    /// Post one envelope to a peer inbox as a single-message batch.
    /// A non-success status is a transport error; the peer
    /// deduplicates by link, so redelivery after an ambiguous failure
    /// is safe.
    pub async fn post_message(
        &self,
        endpoint: &str,
        envelope: &Envelope,
    ) -> Result<(), SealboxError> {
        let body = serde_json::to_vec(&serde_json::json!({ "messages": [envelope] }))
            .map_err(|e| SealboxError::Internal(e.to_string()))?;

        let mut request = self
            .http
            .post(endpoint)
            .header("content-type", "application/json");
        if let Some(identity) = &self.identity {
            let signature = hex::encode(identity.keypair.sign(&body).to_bytes());
            request = request
                .header(PERMALINK_HEADER, &identity.permalink)
                .header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| SealboxError::Transport {
                message: format!("federation post to {endpoint} failed"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SealboxError::Transport {
                message: format!("federation post to {endpoint} returned {status}"),
                source: None,
            });
        }
        debug!(endpoint, link = %envelope.link, "federated delivery ok");
        Ok(())
    }
}

fn federation_identity(
    config: &DeliveryConfig,
) -> Result<Option<Arc<FederationIdentity>>, SealboxError> {
    match (
        config.federation_permalink.as_deref(),
        config.federation_secret_key.as_deref(),
    ) {
        (Some(permalink), Some(secret_hex)) => {
            let bytes = hex::decode(secret_hex).map_err(|e| {
                SealboxError::Config(format!("federation secret key is not valid hex: {e}"))
            })?;
            let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
                SealboxError::Config("federation secret key must be 32 bytes".to_string())
            })?;
            Ok(Some(Arc::new(FederationIdentity {
                permalink: permalink.to_string(),
                keypair: NodeKeypair::from_bytes(&bytes),
            })))
        }
        (None, None) => Ok(None),
        _ => Err(SealboxError::Config(
            "federation_permalink and federation_secret_key must be set together".to_string(),
        )),
    }
}
