// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduled maintenance: the retry sweep, seal lifecycle jobs, and
//! the replication pump, each on its own periodic trigger with a
//! per-invocation time budget.

pub mod budget;
pub mod runner;
pub mod scheduler;

pub use budget::TimeBudget;
pub use runner::{Job, JobReport, JobRunner};
pub use scheduler::{Scheduler, Trigger, triggers};
