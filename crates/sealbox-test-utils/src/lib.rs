// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sealbox integration tests.
//!
//! Provides mock collaborators and a harness assembling the full node
//! stack over a temp database, for fast, deterministic tests without
//! external services.
//!
//! # Components
//!
//! - [`TestHarness`] - full stack over temp SQLite
//! - [`MockLedger`] - programmable ledger double
//! - [`MockPushTransport`] - frame-capturing push double

pub mod harness;
pub mod mock_ledger;
pub mod mock_push;

pub use harness::{TestHarness, TestHarnessBuilder, envelope};
pub use mock_ledger::MockLedger;
pub use mock_push::MockPushTransport;
