// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Local credential issuer for the built-in push channel.

use async_trait::async_trait;

use sealbox_config::model::AuthConfig;
use sealbox_core::types::DeliveryCredentials;
use sealbox_core::{
    AdapterType, CredentialIssuer, HealthStatus, PluginAdapter, SealboxError, now_ms,
};

use crate::random_hex;

/// Issues random, short-lived credentials pointing at this node's own
/// push endpoint. Issuance is stateless; the gateway enforces session
/// auth separately, so these credentials only scope the push channel.
pub struct LocalCredentialIssuer {
    config: AuthConfig,
}

impl LocalCredentialIssuer {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PluginAdapter for LocalCredentialIssuer {
    fn name(&self) -> &str {
        "local-credentials"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Credentials
    }

    async fn health_check(&self) -> Result<HealthStatus, SealboxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SealboxError> {
        Ok(())
    }
}

#[async_trait]
impl CredentialIssuer for LocalCredentialIssuer {
    async fn issue(&self, _client_id: &str) -> Result<DeliveryCredentials, SealboxError> {
        Ok(DeliveryCredentials {
            endpoint: self.config.push_endpoint.clone(),
            region: self.config.region.clone(),
            access_key: random_hex(16),
            secret_key: random_hex(32),
            session_token: random_hex(32),
            expires_at: now_ms() + (self.config.credential_ttl_secs as i64) * 1000,
        })
    }
}
