// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits for Sealbox's external seams.

pub mod adapter;
pub mod credentials;
pub mod ledger;
pub mod push;
pub mod storage;

pub use adapter::PluginAdapter;
pub use credentials::CredentialIssuer;
pub use ledger::{Ledger, LedgerStatus};
pub use push::PushTransport;
pub use storage::StorageAdapter;
