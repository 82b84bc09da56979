// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP ledger client.
//!
//! Talks to a ledger node's REST API: POST an anchor, GET a
//! transaction's confirmation count. Every call carries the configured
//! timeout; the tracker treats all errors here as recoverable.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use sealbox_config::model::SealConfig;
use sealbox_core::{Ledger, LedgerStatus, SealboxError};

#[derive(Deserialize)]
struct SubmitResponse {
    txid: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    confirmations: u32,
}

/// Ledger backed by an HTTP API at a configured base URL.
pub struct HttpLedger {
    http: reqwest::Client,
    base_url: String,
}

impl HttpLedger {
    pub fn new(base_url: &str, config: &SealConfig) -> Result<Self, SealboxError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.ledger_timeout_secs))
            .build()
            .map_err(|e| SealboxError::Ledger {
                message: "failed to build ledger HTTP client".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn submit(&self, payload_link: &str, address: &str) -> Result<String, SealboxError> {
        let url = format!("{}/seals", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "payloadLink": payload_link,
                "address": address,
            }))
            .send()
            .await
            .map_err(|e| SealboxError::Ledger {
                message: format!("submit to {url} failed"),
                source: Some(Box::new(e)),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SealboxError::Ledger {
                message: format!("submit to {url} returned {status}"),
                source: None,
            });
        }
        let body: SubmitResponse = response.json().await.map_err(|e| SealboxError::Ledger {
            message: "malformed submit response".to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(body.txid)
    }

    async fn status(&self, txid: &str) -> Result<Option<LedgerStatus>, SealboxError> {
        let url = format!("{}/seals/{txid}", self.base_url);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| SealboxError::Ledger {
                message: format!("status lookup at {url} failed"),
                source: Some(Box::new(e)),
            })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            // The ledger has not observed this transaction yet.
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(SealboxError::Ledger {
                message: format!("status lookup at {url} returned {status}"),
                source: None,
            });
        }
        let body: StatusResponse = response.json().await.map_err(|e| SealboxError::Ledger {
            message: "malformed status response".to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(Some(LedgerStatus {
            confirmations: body.confirmations,
        }))
    }
}
