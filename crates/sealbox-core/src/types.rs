// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Sealbox workspace.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// Current wall-clock time as epoch milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Which physical message table a query targets.
///
/// Every message query must carry a direction; there is no default. The
/// inbox is keyed by author, the outbox by recipient.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// The signed wrapper around a message, carrying routing metadata.
///
/// `link` is the content hash of the full envelope; `payload_link` the
/// content hash of the innermost signed payload. Envelopes are immutable
/// after storage; only delivery metadata associated with them changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "_author")]
    pub author: String,
    #[serde(rename = "_recipient")]
    pub recipient: String,
    #[serde(rename = "_link")]
    pub link: String,
    #[serde(rename = "_payloadLink")]
    pub payload_link: String,
    #[serde(default)]
    pub context: Option<String>,
    pub time: i64,
    pub object: serde_json::Value,
}

impl Envelope {
    /// Content hash of this envelope with the self-referential `_link`
    /// field excluded from the hashed bytes.
    pub fn compute_link(&self) -> String {
        let mut unlinked = self.clone();
        unlinked.link = String::new();
        let bytes = serde_json::to_vec(&unlinked)
            .expect("envelope is always JSON-serializable");
        hex::encode(Sha256::digest(&bytes))
    }

    /// Reject malformed envelopes before they reach storage.
    ///
    /// Checks required routing fields and that `_link` matches the
    /// envelope's content hash.
    pub fn validate(&self) -> Result<(), crate::SealboxError> {
        if self.author.is_empty() || self.recipient.is_empty() {
            return Err(crate::SealboxError::InvalidMessageFormat(
                "missing author or recipient".into(),
            ));
        }
        if self.payload_link.is_empty() {
            return Err(crate::SealboxError::InvalidMessageFormat(
                "missing payload link".into(),
            ));
        }
        if self.time <= 0 {
            return Err(crate::SealboxError::InvalidMessageFormat(
                "missing or invalid time".into(),
            ));
        }
        let expected = self.compute_link();
        if self.link != expected {
            return Err(crate::SealboxError::InvalidMessageFormat(format!(
                "link mismatch: declared {} computed {}",
                self.link, expected
            )));
        }
        Ok(())
    }
}

/// A published identity known to the directory.
///
/// `permalink` is the stable content hash of the identity's first
/// version; `pub_key` the current hex-encoded Ed25519 verifying key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub permalink: String,
    #[serde(rename = "pub")]
    pub pub_key: String,
    /// Federated HTTP inbox endpoint, when the party is reachable that way.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: i64,
}

/// Whether a registered identity was already in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    Known,
    New,
}

/// A per-session delivery checkpoint: the last acknowledged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub link: String,
    pub time: i64,
}

/// Client- and server-side delivery positions for a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub sent: Option<Cursor>,
    #[serde(default)]
    pub received: Option<Cursor>,
}

/// Durable record of authentication state for one client connection.
///
/// One live session per `client_id`; at most one session per permalink
/// is `connected` and most recent at a time (latest wins on concurrent
/// connects).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub client_id: String,
    pub permalink: String,
    pub challenge: Option<String>,
    pub authenticated: bool,
    pub connected: bool,
    pub time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default)]
    pub client_position: Option<Position>,
    #[serde(default)]
    pub server_position: Option<Position>,
}

/// Lifecycle record for a ledger anchor of a payload.
///
/// `unsealed == true` means registered intent, not yet submitted
/// (watch state). Never deleted; failure paths only annotate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealRecord {
    #[serde(rename = "payloadLink")]
    pub payload_link: String,
    pub address: String,
    pub unsealed: bool,
    pub confirmations: i64,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub write_time: Option<i64>,
    #[serde(default)]
    pub read_time: Option<i64>,
    #[serde(default)]
    pub confirm_time: Option<i64>,
    #[serde(default)]
    pub error_count: i64,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub created_at: i64,
}

/// Which table a change record originated from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeSource {
    Inbox,
    Outbox,
    Seals,
}

/// A before/after pair describing a single storage mutation.
///
/// Appended in the same transaction as the mutation it describes, so
/// `seq` reflects commit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub seq: i64,
    pub source: ChangeSource,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
    pub created_at: i64,
}

/// A typed event derived from a storage change, republished on the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: String,
    pub topic: String,
    pub data: serde_json::Value,
    pub time: i64,
}

impl DomainEvent {
    pub fn new(topic: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            data,
            time: now_ms(),
        }
    }
}

/// Outcome of one delivery attempt over a batch.
///
/// `delivered` and `failed` carry message links so the caller can retry
/// exactly the remainder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
    /// No transport was available; the batch stays queued for the sweep.
    pub queued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Short-lived credentials scoping push-channel access to one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryCredentials {
    pub endpoint: String,
    pub region: String,
    #[serde(rename = "accessKey")]
    pub access_key: String,
    #[serde(rename = "secretKey")]
    pub secret_key: String,
    #[serde(rename = "sessionToken")]
    pub session_token: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
}

/// Challenge plus pre-issued credentials for the initial handshake round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemporaryIdentity {
    pub credentials: DeliveryCredentials,
    pub challenge: String,
    pub time: i64,
}

/// Identifies the type of adapter behind a seam.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Ledger,
    Push,
    Credentials,
    Channel,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}
