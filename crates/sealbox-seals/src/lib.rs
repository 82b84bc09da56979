// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seal tracking against an external public ledger.

pub mod ledger;
pub mod tracker;

pub use ledger::HttpLedger;
pub use tracker::{SealTracker, SweepReport};
