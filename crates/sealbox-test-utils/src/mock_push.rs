// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push transport double that records published frames.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use sealbox_core::{PushTransport, SealboxError};

/// A `PushTransport` that captures everything published to it.
///
/// Unlike the live registry, no client needs to be attached: publishes
/// succeed unless the failure switch is set, which lets tests choose
/// between "client online" and "push channel gone" without a socket.
#[derive(Default)]
pub struct MockPushTransport {
    published: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl MockPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every `(topic, payload)` published so far, in order.
    pub fn published(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), SealboxError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SealboxError::Transport {
                message: format!("mock push refused topic {topic}"),
                source: None,
            });
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}
