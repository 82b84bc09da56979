// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential issuer seam: short-lived delivery credentials per client.

use async_trait::async_trait;

use crate::error::SealboxError;
use crate::types::DeliveryCredentials;

/// Issues temporary, client-scoped credentials for the push channel.
///
/// Called during the handshake (/preauth pre-issuance and again on a
/// successful /auth). Issuance must be cheap and repeatable; expiry is
/// the issuer's concern.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, client_id: &str) -> Result<DeliveryCredentials, SealboxError>;
}
