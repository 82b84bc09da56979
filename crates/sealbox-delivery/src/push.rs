// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process push channel registry.
//!
//! Connected WebSocket clients register an outbound channel here under
//! their client id. Publishing to `{client_id}/message` forwards the
//! frame to that channel; publishing to a client that is not attached
//! is a transport error, which the delivery engine treats as "fall back
//! or queue".

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use sealbox_core::{
    AdapterType, HealthStatus, PluginAdapter, PushTransport, SealboxError,
};

/// One frame pushed to a client: the full topic and the JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PushFrame {
    pub topic: String,
    pub payload: String,
}

/// Registry of live client channels keyed by client id.
#[derive(Default)]
pub struct LivePushRegistry {
    channels: DashMap<String, mpsc::UnboundedSender<PushFrame>>,
}

impl LivePushRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a client. Returns the receiving end the socket task
    /// drains. A second attach for the same client replaces the first;
    /// the older receiver's sender is dropped and its socket winds down.
    pub fn attach(&self, client_id: &str) -> mpsc::UnboundedReceiver<PushFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.channels.insert(client_id.to_string(), tx);
        debug!(client_id, "push channel attached");
        rx
    }

    /// Detach a client. Idempotent.
    pub fn detach(&self, client_id: &str) {
        if self.channels.remove(client_id).is_some() {
            debug!(client_id, "push channel detached");
        }
    }

    pub fn is_attached(&self, client_id: &str) -> bool {
        self.channels.contains_key(client_id)
    }

    pub fn attached_count(&self) -> usize {
        self.channels.len()
    }
}

#[async_trait]
impl PluginAdapter for LivePushRegistry {
    fn name(&self) -> &str {
        "live-push"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Push
    }

    async fn health_check(&self) -> Result<HealthStatus, SealboxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SealboxError> {
        self.channels.clear();
        Ok(())
    }
}

#[async_trait]
impl PushTransport for LivePushRegistry {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SealboxError> {
        let client_id = topic.split('/').next().unwrap_or_default();
        let sender = self.channels.get(client_id).ok_or_else(|| {
            SealboxError::Transport {
                message: format!("no live channel for client {client_id}"),
                source: None,
            }
        })?;
        sender
            .send(PushFrame {
                topic: topic.to_string(),
                payload: payload.to_string(),
            })
            .map_err(|_| SealboxError::Transport {
                message: format!("push channel for client {client_id} is closed"),
                source: None,
            })
    }
}
