// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The replicator: pumps committed change records into typed domain
//! events on the bus.
//!
//! At-least-once: the whole fetched batch is mapped before anything is
//! published, and the cursor only advances after the batch went out.
//! A mapping or publish-path failure leaves the cursor untouched, so
//! the next run redelivers the batch. Subscribers deduplicate by event
//! content where it matters.

pub mod topics;

use tracing::{debug, warn};

use sealbox_bus::EventBus;
use sealbox_core::types::{ChangeRecord, DomainEvent};
use sealbox_core::SealboxError;
use sealbox_storage::Database;
use sealbox_storage::queries::changes;

pub use topics::map_change;

/// Cursor name under which the replicator tracks its read position.
pub const REPLICATOR_CURSOR: &str = "replicator";

/// Map a batch of change records to domain events, in order.
///
/// All-or-nothing: one malformed record fails the whole batch, so a
/// partial prefix is never published ahead of a cursor that was not
/// advanced.
pub fn to_events(records: &[ChangeRecord]) -> Result<Vec<DomainEvent>, SealboxError> {
    let mut events = Vec::with_capacity(records.len());
    for record in records {
        if let Some(event) = map_change(record)? {
            events.push(event);
        }
    }
    Ok(events)
}

/// Replays the change log onto the event bus.
#[derive(Clone)]
pub struct Replicator {
    db: Database,
    bus: EventBus,
}

impl Replicator {
    pub fn new(db: Database, bus: EventBus) -> Self {
        Self { db, bus }
    }

    /// Process up to `limit` change records past the stored cursor.
    ///
    /// Returns the number of events published. Zero means the log is
    /// drained.
    pub async fn run_once(&self, limit: i64) -> Result<usize, SealboxError> {
        let cursor = changes::get_cursor(&self.db, REPLICATOR_CURSOR).await?;
        let records = changes::fetch_after(&self.db, cursor, limit).await?;
        let Some(last) = records.last() else {
            return Ok(0);
        };
        let last_seq = last.seq;

        let events = to_events(&records).inspect_err(|e| {
            warn!(cursor, error = %e, "change batch failed to map, will redeliver");
        })?;
        let count = events.len();
        for event in events {
            self.bus.publish(event);
        }

        changes::set_cursor(&self.db, REPLICATOR_CURSOR, last_seq).await?;
        debug!(from = cursor, to = last_seq, published = count, "replicated");
        Ok(count)
    }
}
