// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The seal tracker: drives anchor records through their lifecycle.
//!
//! watch (intent registered) -> write (submitted, txid known) ->
//! read (observed on the ledger) -> confirm (threshold reached).
//! Failure never deletes a record: submission errors annotate it and
//! leave it in the sweep; a record stuck in write past the grace period
//! is returned to watch state for resubmission.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use sealbox_config::model::SealConfig;
use sealbox_core::types::SealRecord;
use sealbox_core::{Ledger, SealboxError, now_ms};
use sealbox_storage::Database;
use sealbox_storage::queries::seals;

/// Outcome of one tracker sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records moved forward this sweep.
    pub processed: usize,
    /// Records whose ledger call failed.
    pub failed: usize,
}

/// Tracks seal records against an external ledger.
#[derive(Clone)]
pub struct SealTracker {
    db: Database,
    ledger: Arc<dyn Ledger>,
    config: SealConfig,
}

impl SealTracker {
    pub fn new(db: Database, ledger: Arc<dyn Ledger>, config: SealConfig) -> Self {
        Self { db, ledger, config }
    }

    /// Register intent to anchor a payload at an address.
    ///
    /// Idempotent: re-watching an existing anchor returns the current
    /// record unchanged.
    pub async fn watch(&self, payload_link: &str, address: &str) -> Result<SealRecord, SealboxError> {
        match seals::create_seal(&self.db, payload_link, address).await {
            Ok(record) => {
                debug!(payload_link, address, "watching new seal");
                Ok(record)
            }
            Err(e) if e.is_duplicate() => seals::get_seal(&self.db, payload_link, address)
                .await?
                .ok_or_else(|| {
                    SealboxError::Internal(format!(
                        "seal {payload_link} at {address} vanished after duplicate insert"
                    ))
                }),
            Err(e) => Err(e),
        }
    }

    pub async fn get(
        &self,
        payload_link: &str,
        address: &str,
    ) -> Result<Option<SealRecord>, SealboxError> {
        seals::get_seal(&self.db, payload_link, address).await
    }

    /// Submit pending (watch-state) records to the ledger.
    ///
    /// Fail-fast: the first submission error annotates its record and
    /// stops the sweep; a ledger that just failed will most likely fail
    /// for the rest of the batch too.
    pub async fn seal_pending(
        &self,
        deadline: Option<Instant>,
    ) -> Result<SweepReport, SealboxError> {
        let pending = seals::pending(&self.db, self.config.batch_limit as i64).await?;
        let mut report = SweepReport::default();
        for record in pending {
            if deadline_passed(deadline) {
                debug!("seal_pending out of budget");
                break;
            }
            match self
                .ledger
                .submit(&record.payload_link, &record.address)
                .await
            {
                Ok(txid) => {
                    seals::mark_written(&self.db, &record.payload_link, &record.address, &txid)
                        .await?;
                    info!(payload_link = %record.payload_link, txid, "seal submitted");
                    report.processed += 1;
                }
                Err(e) => {
                    warn!(
                        payload_link = %record.payload_link,
                        error = %e,
                        "seal submission failed, stopping sweep"
                    );
                    seals::record_submit_error(
                        &self.db,
                        &record.payload_link,
                        &record.address,
                        &e.to_string(),
                    )
                    .await?;
                    report.failed += 1;
                    break;
                }
            }
        }
        Ok(report)
    }

    /// Poll the ledger for confirmation counts on submitted records.
    ///
    /// Idempotent: a record whose count did not change writes nothing.
    /// Individual lookup failures are logged and skipped; a flaky
    /// ledger should not starve the rest of the batch.
    pub async fn sync_unconfirmed(
        &self,
        deadline: Option<Instant>,
    ) -> Result<SweepReport, SealboxError> {
        let unconfirmed = seals::unconfirmed(
            &self.db,
            self.config.confirmation_threshold,
            self.config.batch_limit as i64,
        )
        .await?;
        let mut report = SweepReport::default();
        for record in unconfirmed {
            if deadline_passed(deadline) {
                debug!("sync_unconfirmed out of budget");
                break;
            }
            let Some(txid) = record.txid.as_deref() else {
                continue;
            };
            match self.ledger.status(txid).await {
                Ok(Some(status)) => {
                    let changed = seals::update_confirmations(
                        &self.db,
                        &record.payload_link,
                        &record.address,
                        status.confirmations as i64,
                    )
                    .await?;
                    if changed {
                        report.processed += 1;
                    }
                }
                Ok(None) => {
                    // Still in write state; the failure check owns this.
                }
                Err(e) => {
                    warn!(txid, error = %e, "confirmation lookup failed");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Requeue records stuck in write state past the grace period.
    pub async fn handle_failures(&self) -> Result<usize, SealboxError> {
        let cutoff = now_ms() - (self.config.grace_period_secs as i64) * 1000;
        let stuck = seals::stuck_in_write(&self.db, cutoff, self.config.batch_limit as i64).await?;
        let mut requeued = 0;
        for record in stuck {
            warn!(
                payload_link = %record.payload_link,
                txid = record.txid.as_deref().unwrap_or(""),
                "seal unobserved past grace period, requeueing"
            );
            seals::requeue(
                &self.db,
                &record.payload_link,
                &record.address,
                "resubmission after grace period",
            )
            .await?;
            requeued += 1;
        }
        Ok(requeued)
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
