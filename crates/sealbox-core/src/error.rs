// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sealbox exchange node.

use thiserror::Error;

/// The primary error type used across all Sealbox crates.
#[derive(Debug, Error)]
pub enum SealboxError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Challenge/response handshake rejected. Terminal for this handshake
    /// attempt; the client must restart from /preauth.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),

    /// A message with this link is already stored for the same direction
    /// and party. Callers on retry paths treat this as success.
    #[error("duplicate message: {link}")]
    Duplicate { link: String },

    /// Envelope signature did not verify against the claimed identity.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Malformed envelope. Rejects the single message, never a whole batch.
    #[error("invalid message format: {0}")]
    InvalidMessageFormat(String),

    /// Missing session or record. Distinguishes "nothing to do" from a fault.
    #[error("not found: {0}")]
    NotFound(String),

    /// Timestamp outside the configured tolerance; the client must resync.
    #[error("clock drift of {skew_ms}ms exceeds tolerance")]
    ClockDrift { skew_ms: i64 },

    /// Single-row storage write failed. Retried by the caller with backoff.
    #[error("put failed: {0}")]
    PutFailed(String),

    /// Batch storage write failed partway. Retried by the caller.
    #[error("batch put failed: {0}")]
    BatchPutFailed(String),

    /// Transport errors (push channel, federation HTTP).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Ledger submission or lookup errors. Recoverable; retried on the
    /// next scheduled sweep and bounded by the failure grace period.
    #[error("ledger error: {message}")]
    Ledger {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SealboxError {
    /// True when the error is an idempotent no-op the caller should
    /// report as success.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, SealboxError::Duplicate { .. })
    }

    /// True when the error means "nothing there", not a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SealboxError::NotFound(_))
    }

    /// True when the single offending message should be skipped without
    /// aborting the surrounding batch.
    pub fn is_message_local(&self) -> bool {
        matches!(
            self,
            SealboxError::Duplicate { .. }
                | SealboxError::InvalidSignature(_)
                | SealboxError::InvalidMessageFormat(_)
        )
    }
}
