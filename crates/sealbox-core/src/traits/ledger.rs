// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger seam: submission and confirmation lookup for payload anchors.

use async_trait::async_trait;

use crate::error::SealboxError;

/// Status of a previously submitted anchor as seen by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStatus {
    /// Confirmation count; zero means observed but not yet confirmed.
    pub confirmations: u32,
}

/// An external, slow, fallible public ledger.
///
/// Submission errors are recoverable: the tracker leaves the seal row
/// in place, annotates it, and retries on a later sweep. Every call is
/// a network operation and must enforce its own timeout.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submits an anchor of `payload_link` at `address`. Returns the
    /// ledger transaction id.
    async fn submit(&self, payload_link: &str, address: &str) -> Result<String, SealboxError>;

    /// Looks up a submitted transaction. `None` means the ledger has
    /// not observed it yet (still in write state).
    async fn status(&self, txid: &str) -> Result<Option<LedgerStatus>, SealboxError>;
}
