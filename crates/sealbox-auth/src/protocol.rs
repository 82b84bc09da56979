// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The challenge/response handshake.
//!
//! Two rounds: `/preauth` issues a random challenge plus pre-issued
//! push credentials; `/auth` verifies the client's signature over the
//! challenge and promotes the session to authenticated. At most one
//! challenge per client is valid at a time, and a challenge is consumed
//! on first successful use.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sealbox_config::model::AuthConfig;
use sealbox_core::types::{Position, Session, TemporaryIdentity};
use sealbox_core::{CredentialIssuer, SealboxError, now_ms};
use sealbox_identity::{IdentityDirectory, verify_detached};
use sealbox_storage::Database;
use sealbox_storage::queries::sessions;

use crate::random_hex;

/// The client's second handshake round: a signature over the issued
/// challenge, the client's wall clock, and optionally its delivery
/// position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeResponse {
    /// Hex-encoded Ed25519 signature over the challenge bytes.
    pub signature: String,
    /// Client wall clock in epoch milliseconds, checked against drift
    /// tolerance.
    pub time: i64,
    #[serde(default)]
    pub position: Option<Position>,
}

/// Server side of the handshake, backed by the sessions table and the
/// identity directory.
#[derive(Clone)]
pub struct AuthProtocol {
    db: Database,
    directory: IdentityDirectory,
    credentials: Arc<dyn CredentialIssuer>,
    config: AuthConfig,
}

impl AuthProtocol {
    pub fn new(
        db: Database,
        directory: IdentityDirectory,
        credentials: Arc<dyn CredentialIssuer>,
        config: AuthConfig,
    ) -> Self {
        Self {
            db,
            directory,
            credentials,
            config,
        }
    }

    fn challenge_ttl_ms(&self) -> i64 {
        (self.config.challenge_ttl_secs as i64) * 1000
    }

    /// First handshake round: issue (or re-issue) a challenge and
    /// pre-issued push credentials.
    ///
    /// Idempotent inside the challenge TTL: a client retrying /preauth
    /// gets the same challenge back, so a racing retry cannot
    /// invalidate a response already in flight. Credentials are always
    /// freshly issued.
    pub async fn pre_authenticate(
        &self,
        client_id: &str,
        permalink: &str,
    ) -> Result<TemporaryIdentity, SealboxError> {
        let existing = sessions::get_session(&self.db, client_id).await?;
        let reusable = existing.and_then(|s| {
            if s.permalink == permalink && now_ms() - s.time < self.challenge_ttl_ms() {
                s.challenge
            } else {
                None
            }
        });

        let challenge = match reusable {
            Some(challenge) => {
                debug!(client_id, "re-issuing pending challenge");
                challenge
            }
            None => {
                let challenge = random_hex(32);
                sessions::put_challenge(&self.db, client_id, permalink, &challenge).await?;
                debug!(client_id, permalink, "issued new challenge");
                challenge
            }
        };

        let credentials = self.credentials.issue(client_id).await?;
        Ok(TemporaryIdentity {
            credentials,
            challenge,
            time: now_ms(),
        })
    }

    /// Second handshake round: verify the signed challenge and promote
    /// the session.
    ///
    /// Rejections are terminal for this attempt; the client restarts
    /// from /preauth. On success the challenge is consumed and a bearer
    /// session token is issued.
    pub async fn authenticate(
        &self,
        client_id: &str,
        response: &ChallengeResponse,
    ) -> Result<Session, SealboxError> {
        let session = sessions::get_session(&self.db, client_id)
            .await?
            .ok_or_else(|| {
                SealboxError::HandshakeFailed(format!("no session for client {client_id}"))
            })?;
        let challenge = session.challenge.as_deref().ok_or_else(|| {
            SealboxError::HandshakeFailed("no pending challenge for client".to_string())
        })?;

        let now = now_ms();
        if now - session.time > self.challenge_ttl_ms() {
            return Err(SealboxError::HandshakeFailed("challenge expired".to_string()));
        }

        let skew_ms = (now - response.time).abs();
        if skew_ms > (self.config.clock_drift_secs as i64) * 1000 {
            warn!(client_id, skew_ms, "rejecting response outside drift tolerance");
            return Err(SealboxError::ClockDrift { skew_ms });
        }

        let identity = self
            .directory
            .by_permalink(&session.permalink)
            .await?
            .ok_or_else(|| {
                SealboxError::HandshakeFailed(format!(
                    "identity {} is not in the directory",
                    session.permalink
                ))
            })?;
        verify_detached(&identity.pub_key, challenge.as_bytes(), &response.signature)
            .map_err(|e| SealboxError::HandshakeFailed(e.to_string()))?;

        let token = random_hex(32);
        let session =
            sessions::authenticate_session(&self.db, client_id, &token, response.position.as_ref())
                .await?;
        info!(client_id, permalink = %session.permalink, "handshake complete");
        Ok(session)
    }

    pub async fn session(&self, client_id: &str) -> Result<Option<Session>, SealboxError> {
        sessions::get_session(&self.db, client_id).await
    }

    /// The session live push should target for a permalink, if any.
    pub async fn live_session(&self, permalink: &str) -> Result<Option<Session>, SealboxError> {
        sessions::live_session_by_permalink(&self.db, permalink).await
    }

    /// Best-effort presence update. A missing session is logged, not an
    /// error: disconnect races with session deletion.
    pub async fn update_presence(
        &self,
        client_id: &str,
        connected: bool,
    ) -> Result<Option<Session>, SealboxError> {
        let updated = sessions::update_presence(&self.db, client_id, connected).await?;
        if updated.is_none() {
            debug!(client_id, connected, "presence update for unknown client");
        }
        Ok(updated)
    }

    /// Revoke every session belonging to a permalink, e.g. after a key
    /// rotation. Returns how many sessions were removed.
    pub async fn revoke_permalink(&self, permalink: &str) -> Result<usize, SealboxError> {
        let removed = sessions::delete_sessions_by_permalink(&self.db, permalink).await?;
        if removed > 0 {
            info!(permalink, removed, "revoked sessions");
        }
        Ok(removed)
    }
}
