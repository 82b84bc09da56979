// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic trigger loops for the maintenance jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use sealbox_config::model::JobsConfig;

use crate::budget::TimeBudget;
use crate::runner::{Job, JobRunner};

/// One periodic job registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub job: Job,
    pub period: Duration,
}

/// The periodic jobs for a node, with periods from configuration.
///
/// Warmup is not here: it runs once at startup, before the loops.
pub fn triggers(config: &JobsConfig) -> Vec<Trigger> {
    vec![
        Trigger {
            job: Job::RetryDelivery,
            period: Duration::from_secs(config.retry_delivery_secs),
        },
        Trigger {
            job: Job::Pollchain,
            period: Duration::from_secs(config.pollchain_secs),
        },
        Trigger {
            job: Job::SealPending,
            period: Duration::from_secs(config.sealpending_secs),
        },
        Trigger {
            job: Job::CheckFailedSeals,
            period: Duration::from_secs(config.check_failed_seals_secs),
        },
        Trigger {
            job: Job::Replicate,
            period: Duration::from_secs(config.replicate_secs),
        },
    ]
}

/// Spawns and supervises one loop per trigger.
pub struct Scheduler {
    runner: Arc<JobRunner>,
    config: JobsConfig,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>, config: JobsConfig) -> Self {
        Self { runner, config }
    }

    /// Spawn every trigger loop. Loops run until `cancel` fires; the
    /// returned handles complete once their loop has exited.
    ///
    /// A failed run is logged and the loop keeps its cadence; jobs are
    /// sweeps over durable state, so the next tick retries naturally.
    pub fn spawn(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        let safety_margin = Duration::from_secs(self.config.safety_margin_secs);
        triggers(&self.config)
            .into_iter()
            .map(|trigger| {
                let runner = self.runner.clone();
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(trigger.period);
                    // Skip the first immediate tick.
                    interval.tick().await;

                    loop {
                        tokio::select! {
                            _ = interval.tick() => {
                                let budget = TimeBudget::new(trigger.period, safety_margin);
                                match runner.run(trigger.job, &budget).await {
                                    Ok(report) => {
                                        if report.processed > 0 || report.failed > 0 {
                                            debug!(
                                                job = %trigger.job,
                                                processed = report.processed,
                                                failed = report.failed,
                                                "job complete"
                                            );
                                        }
                                    }
                                    Err(e) => {
                                        warn!(job = %trigger.job, error = %e, "job failed");
                                    }
                                }
                            }
                            _ = cancel.cancelled() => {
                                debug!(job = %trigger.job, "job loop shutting down");
                                break;
                            }
                        }
                    }
                })
            })
            .collect()
    }
}
