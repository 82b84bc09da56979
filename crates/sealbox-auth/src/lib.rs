// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Challenge/response handshake and session management.

use rand::RngCore;

pub mod credentials;
pub mod protocol;

pub use credentials::LocalCredentialIssuer;
pub use protocol::{AuthProtocol, ChallengeResponse};

/// `len` random bytes from the OS RNG, hex-encoded.
pub(crate) fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}
