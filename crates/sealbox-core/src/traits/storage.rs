// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage adapter trait for persistence backends.

use async_trait::async_trait;

use crate::error::SealboxError;
use crate::traits::adapter::PluginAdapter;

/// Lifecycle seam for the durable store backing sessions, message
/// boxes, seals, and the change log.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the backend and applies pending schema migrations.
    async fn initialize(&self) -> Result<(), SealboxError>;

    /// Flushes pending writes and releases connections.
    async fn close(&self) -> Result<(), SealboxError>;
}
