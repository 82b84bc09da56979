// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content addressing: SHA-256 links over canonical JSON.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over raw bytes.
pub fn content_link(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex-encoded SHA-256 over a JSON value's canonical serialization.
///
/// Canonical means serde_json's default compact form with the struct's
/// declared field order; every party derives links from the same typed
/// shapes, so the bytes agree.
pub fn json_link(value: &serde_json::Value) -> String {
    let bytes = serde_json::to_vec(value).expect("JSON value is always serializable");
    content_link(&bytes)
}
