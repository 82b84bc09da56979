// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-invocation time budgets for scheduled jobs.

use std::time::{Duration, Instant};

/// The time a job may spend issuing new work.
///
/// The usable window is the trigger period minus the configured safety
/// margin, so a job always finishes (or abandons its remainder) before
/// its next trigger fires. Work left on the table is resumable: every
/// sweep re-reads its backlog from storage.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    started: Instant,
    window: Duration,
}

impl TimeBudget {
    pub fn new(period: Duration, safety_margin: Duration) -> Self {
        Self {
            started: Instant::now(),
            window: period.saturating_sub(safety_margin),
        }
    }

    /// The instant past which no new work may be issued.
    pub fn deadline(&self) -> Instant {
        self.started + self.window
    }

    pub fn remaining(&self) -> Duration {
        self.deadline().saturating_duration_since(Instant::now())
    }

    pub fn exhausted(&self) -> bool {
        self.remaining().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_period_minus_margin() {
        let budget = TimeBudget::new(Duration::from_secs(60), Duration::from_secs(20));
        let remaining = budget.remaining();
        assert!(remaining <= Duration::from_secs(40));
        assert!(remaining > Duration::from_secs(39));
        assert!(!budget.exhausted());
    }

    #[test]
    fn margin_wider_than_period_exhausts_immediately() {
        let budget = TimeBudget::new(Duration::from_secs(5), Duration::from_secs(20));
        assert!(budget.exhausted());
        assert_eq!(budget.remaining(), Duration::ZERO);
    }
}
