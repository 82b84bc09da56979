// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sealbox exchange node.
//!
//! Provides the foundational trait definitions, error types, and domain
//! types used throughout the workspace. All collaborator seams (storage,
//! ledger, push transport, credential issuer) implement traits defined
//! here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::SealboxError;
pub use types::{
    AdapterType, ChangeRecord, ChangeSource, ContactStatus, Cursor, DeliveryCredentials,
    DeliveryResult, Direction, DomainEvent, Envelope, HealthStatus, Identity, Position,
    SealRecord, Session, TemporaryIdentity, now_ms,
};

pub use traits::{
    CredentialIssuer, Ledger, LedgerStatus, PluginAdapter, PushTransport, StorageAdapter,
};
