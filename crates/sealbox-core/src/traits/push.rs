// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport seam: server-to-client topic delivery.

use async_trait::async_trait;

use crate::error::SealboxError;

/// Topic for server-to-client batch delivery: `{client_id}/message`.
pub fn message_topic(client_id: &str) -> String {
    format!("{client_id}/message")
}

/// Topic for client-to-server acknowledgements: `{client_id}/ack`.
pub fn ack_topic(client_id: &str) -> String {
    format!("{client_id}/ack")
}

/// A live push channel to connected clients.
///
/// Delivery over a topic the client is not attached to is a transport
/// error; the delivery engine falls back or queues in that case.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Publishes a JSON payload to a topic.
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SealboxError>;
}
