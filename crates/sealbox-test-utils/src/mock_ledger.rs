// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory ledger double with programmable confirmation counts and a
//! failure switch.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;

use sealbox_core::{Ledger, LedgerStatus, SealboxError};

/// A `Ledger` that assigns deterministic txids and serves confirmation
/// counts set by the test.
#[derive(Default)]
pub struct MockLedger {
    submissions: AtomicU64,
    failing: AtomicBool,
    statuses: Mutex<HashMap<String, u32>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent ledger call fails with a `Ledger` error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Serve this confirmation count for `txid` from now on.
    pub fn set_confirmations(&self, txid: &str, confirmations: u32) {
        self.statuses
            .lock()
            .unwrap()
            .insert(txid.to_string(), confirmations);
    }

    /// How many submissions reached the ledger.
    pub fn submission_count(&self) -> u64 {
        self.submissions.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), SealboxError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SealboxError::Ledger {
                message: "mock ledger down".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MockLedger {
    async fn submit(&self, payload_link: &str, _address: &str) -> Result<String, SealboxError> {
        self.check()?;
        let n = self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(format!("tx-{payload_link}-{n}"))
    }

    async fn status(&self, txid: &str) -> Result<Option<LedgerStatus>, SealboxError> {
        self.check()?;
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(txid)
            .copied()
            .map(|confirmations| LedgerStatus { confirmations }))
    }
}
