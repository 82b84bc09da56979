// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row model types for storage entities.
//!
//! The canonical domain types live in `sealbox-core::types`; this module
//! re-exports them and adds the row shapes that carry table-local
//! metadata.

use serde::{Deserialize, Serialize};

pub use sealbox_core::types::{
    ChangeRecord, ChangeSource, Cursor, Direction, Envelope, Identity, Position, SealRecord,
    Session,
};

/// An outbox row: the immutable envelope plus mutable delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    #[serde(flatten)]
    pub envelope: Envelope,
    #[serde(rename = "deliveredAt")]
    pub delivered_at: Option<i64>,
    #[serde(rename = "deliveryError")]
    pub delivery_error: Option<String>,
    #[serde(rename = "rejectedReason")]
    pub rejected_reason: Option<String>,
}
