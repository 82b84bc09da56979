// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named jobs and the runner that dispatches them.
//!
//! Every job is a sweep over durable state: it reads its backlog from
//! storage, works until done or out of budget, and leaves the rest for
//! the next trigger. Running a job twice is always safe.

use std::sync::Arc;

use strum::{Display, EnumString};
use tracing::{debug, info};

use sealbox_core::SealboxError;
use sealbox_delivery::DeliveryEngine;
use sealbox_replicator::{REPLICATOR_CURSOR, Replicator};
use sealbox_seals::SealTracker;
use sealbox_storage::Database;
use sealbox_storage::queries::changes;

use crate::budget::TimeBudget;

/// Change records pumped per replicate tick.
const REPLICATE_BATCH: i64 = 256;

/// The scheduled jobs this node knows how to run.
///
/// Serialized names match the trigger contract used in logs and
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
pub enum Job {
    #[strum(serialize = "warmup")]
    Warmup,
    #[strum(serialize = "retryDelivery")]
    RetryDelivery,
    #[strum(serialize = "pollchain")]
    Pollchain,
    #[strum(serialize = "sealpending")]
    SealPending,
    #[strum(serialize = "checkFailedSeals")]
    CheckFailedSeals,
    #[strum(serialize = "replicate")]
    Replicate,
}

/// Outcome of one job invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    pub job: Job,
    /// Items the job moved forward.
    pub processed: usize,
    /// Items whose attempt failed and stays in the backlog.
    pub failed: usize,
}

impl JobReport {
    fn empty(job: Job) -> Self {
        Self {
            job,
            processed: 0,
            failed: 0,
        }
    }
}

/// Dispatches jobs onto the engines that do the actual work.
///
/// `seals` is `None` when no ledger is configured; the seal jobs then
/// skip without error.
pub struct JobRunner {
    db: Database,
    delivery: DeliveryEngine,
    replicator: Replicator,
    seals: Option<SealTracker>,
}

impl JobRunner {
    pub fn new(
        db: Database,
        delivery: DeliveryEngine,
        replicator: Replicator,
        seals: Option<SealTracker>,
    ) -> Arc<Self> {
        Arc::new(Self {
            db,
            delivery,
            replicator,
            seals,
        })
    }

    /// Run one job within the given budget.
    pub async fn run(&self, job: Job, budget: &TimeBudget) -> Result<JobReport, SealboxError> {
        let deadline = Some(budget.deadline());
        match job {
            Job::Warmup => {
                // Storage liveness probe; also primes the page cache.
                changes::get_cursor(&self.db, REPLICATOR_CURSOR).await?;
                info!("warmup complete");
                Ok(JobReport::empty(job))
            }
            Job::RetryDelivery => {
                let result = self.delivery.retry_failed(deadline).await?;
                Ok(JobReport {
                    job,
                    processed: result.delivered.len(),
                    failed: result.failed.len(),
                })
            }
            Job::Pollchain => match &self.seals {
                Some(tracker) => {
                    let report = tracker.sync_unconfirmed(deadline).await?;
                    Ok(JobReport {
                        job,
                        processed: report.processed,
                        failed: report.failed,
                    })
                }
                None => Ok(self.skip_unledgered(job)),
            },
            Job::SealPending => match &self.seals {
                Some(tracker) => {
                    let report = tracker.seal_pending(deadline).await?;
                    Ok(JobReport {
                        job,
                        processed: report.processed,
                        failed: report.failed,
                    })
                }
                None => Ok(self.skip_unledgered(job)),
            },
            Job::CheckFailedSeals => match &self.seals {
                Some(tracker) => {
                    let requeued = tracker.handle_failures().await?;
                    Ok(JobReport {
                        job,
                        processed: requeued,
                        failed: 0,
                    })
                }
                None => Ok(self.skip_unledgered(job)),
            },
            Job::Replicate => {
                let published = self.replicator.run_once(REPLICATE_BATCH).await?;
                Ok(JobReport {
                    job,
                    processed: published,
                    failed: 0,
                })
            }
        }
    }

    fn skip_unledgered(&self, job: Job) -> JobReport {
        debug!(job = %job, "no ledger configured, skipping");
        JobReport::empty(job)
    }
}
