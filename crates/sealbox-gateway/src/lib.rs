// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The HTTP/WebSocket gateway: handshake endpoints, inbox intake,
//! message submission, and the live push channel.

pub mod auth;
pub mod handlers;
pub mod server;
pub mod ws;

pub use server::{GatewayState, router, start_server};
