// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the Sealbox exchange node.
//!
//! Layout:
//! - [`database`]: connection handle, pragmas, error mapping
//! - [`migrations`]: embedded schema, versioned by `PRAGMA user_version`
//! - [`queries`]: typed query functions, one module per table family
//! - [`adapter`]: the [`SqliteStorage`] plugin adapter
//!
//! Mutations that downstream consumers must observe append rows to the
//! `changes` table inside the same transaction, which gives the
//! replicator a commit-ordered change feed.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use queries::messages::MessageQuery;
