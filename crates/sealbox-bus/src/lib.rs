// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus.
//!
//! A thin wrapper over `tokio::sync::broadcast` carrying
//! [`DomainEvent`]s from the replicator to in-process projections.
//! Publishing never blocks and never fails: with no subscribers the
//! event is dropped, which is correct for a bus whose durable source of
//! truth is the change log.

use sealbox_core::DomainEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Default buffered capacity per subscriber.
const DEFAULT_CAPACITY: usize = 256;

/// Broadcast bus for domain events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received it.
    pub fn publish(&self, event: DomainEvent) -> usize {
        trace!(topic = %event.topic, id = %event.id, "bus publish");
        // send() errs only when there are no receivers; that is not a fault.
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to every event published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
