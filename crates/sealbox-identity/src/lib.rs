// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Node identity: Ed25519 keys, content links, and the directory of
//! known parties.

pub mod directory;
pub mod keypair;
pub mod link;

pub use directory::IdentityDirectory;
pub use keypair::{NodeKeypair, verify_detached, verifying_key_from_hex};
pub use link::{content_link, json_link};
