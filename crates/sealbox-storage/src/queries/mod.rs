// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query functions, one module per table family.
//!
//! Every function takes the [`Database`](crate::Database) handle and
//! runs inside the connection's writer thread. Mutations that the
//! replicator must observe append a row to `changes` in the same
//! transaction.

pub mod changes;
pub mod identities;
pub mod messages;
pub mod seals;
pub mod sessions;
