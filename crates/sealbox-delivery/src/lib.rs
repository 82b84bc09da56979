// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery of stored envelopes to recipients over live push or
//! federated HTTP, with a durable retry queue in the outbox.

pub mod engine;
pub mod federation;
pub mod push;

pub use engine::DeliveryEngine;
pub use federation::FederationClient;
pub use push::{LivePushRegistry, PushFrame};
