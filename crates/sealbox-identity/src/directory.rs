// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The identity directory: who is known, and under which key.

use ed25519_dalek::VerifyingKey;
use tracing::debug;

use sealbox_core::types::{ContactStatus, Identity};
use sealbox_core::SealboxError;
use sealbox_storage::queries::identities;
use sealbox_storage::Database;

use crate::keypair::verifying_key_from_hex;

/// Directory of published identities backed by the identities table.
#[derive(Clone)]
pub struct IdentityDirectory {
    db: Database,
}

impl IdentityDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register or refresh an identity.
    ///
    /// The public key must parse as a valid Ed25519 point before it is
    /// stored; a directory entry that cannot verify anything is useless.
    /// Returns whether this permalink was already known.
    pub async fn register(&self, identity: &Identity) -> Result<ContactStatus, SealboxError> {
        verifying_key_from_hex(&identity.pub_key)?;
        let status = identities::upsert_identity(&self.db, identity).await?;
        debug!(permalink = %identity.permalink, ?status, "identity registered");
        Ok(status)
    }

    pub async fn by_permalink(&self, permalink: &str) -> Result<Option<Identity>, SealboxError> {
        identities::get_by_permalink(&self.db, permalink).await
    }

    pub async fn by_pub_key(&self, pub_key: &str) -> Result<Option<Identity>, SealboxError> {
        identities::get_by_pub_key(&self.db, pub_key).await
    }

    /// The verifying key currently published for a permalink.
    pub async fn verifying_key(&self, permalink: &str) -> Result<VerifyingKey, SealboxError> {
        let identity = self
            .by_permalink(permalink)
            .await?
            .ok_or_else(|| SealboxError::NotFound(format!("identity {permalink}")))?;
        verifying_key_from_hex(&identity.pub_key)
    }
}
