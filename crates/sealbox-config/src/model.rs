// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Sealbox exchange node.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject
//! unrecognized config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Sealbox configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to
/// sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SealboxConfig {
    /// Node identity and logging settings.
    #[serde(default)]
    pub node: NodeConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Handshake and session settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Delivery transport settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Seal tracking and ledger settings.
    #[serde(default)]
    pub seal: SealConfig,

    /// Scheduled job settings.
    #[serde(default)]
    pub jobs: JobsConfig,
}

/// Node identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Display name of this node.
    #[serde(default = "default_node_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_node_name() -> String {
    "sealbox".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    7302
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|d| d.join("sealbox/sealbox.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "sealbox.db".to_string())
}

fn default_true() -> bool {
    true
}

/// Handshake and session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Validity window for an issued challenge, in seconds. Repeat
    /// /preauth calls inside this window return the same challenge.
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_secs: u64,

    /// Maximum tolerated skew between a response timestamp and node
    /// time, in seconds.
    #[serde(default = "default_clock_drift")]
    pub clock_drift_secs: u64,

    /// Lifetime of issued delivery credentials, in seconds.
    #[serde(default = "default_credential_ttl")]
    pub credential_ttl_secs: u64,

    /// Push endpoint advertised in issued credentials.
    #[serde(default = "default_push_endpoint")]
    pub push_endpoint: String,

    /// Region advertised in issued credentials.
    #[serde(default = "default_region")]
    pub region: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            challenge_ttl_secs: default_challenge_ttl(),
            clock_drift_secs: default_clock_drift(),
            credential_ttl_secs: default_credential_ttl(),
            push_endpoint: default_push_endpoint(),
            region: default_region(),
        }
    }
}

fn default_challenge_ttl() -> u64 {
    300
}

fn default_clock_drift() -> u64 {
    60
}

fn default_credential_ttl() -> u64 {
    3600
}

fn default_push_endpoint() -> String {
    "ws://127.0.0.1:7302/ws".to_string()
}

fn default_region() -> String {
    "local".to_string()
}

/// Delivery transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Timeout for federated HTTP posts, in seconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Maximum messages re-attempted per retry sweep.
    #[serde(default = "default_retry_batch")]
    pub retry_batch: usize,

    /// Permalink this node signs federated posts as. Peers look it up
    /// in their identity directory to verify the request signature.
    #[serde(default)]
    pub federation_permalink: Option<String>,

    /// Hex-encoded Ed25519 private key for federated post signatures.
    /// Posts go unsigned when unset; peers that require signatures
    /// reject them and the messages stay queued.
    #[serde(default)]
    pub federation_secret_key: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout(),
            retry_batch: default_retry_batch(),
            federation_permalink: None,
            federation_secret_key: None,
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_retry_batch() -> usize {
    50
}

/// Seal tracking and ledger configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SealConfig {
    /// Base URL of the ledger HTTP API. `None` disables submission.
    #[serde(default)]
    pub ledger_url: Option<String>,

    /// Timeout for ledger HTTP calls, in seconds.
    #[serde(default = "default_ledger_timeout")]
    pub ledger_timeout_secs: u64,

    /// Confirmations at which a seal stops being polled.
    #[serde(default = "default_confirmation_threshold")]
    pub confirmation_threshold: i64,

    /// Seals processed per sweep.
    #[serde(default = "default_seal_batch")]
    pub batch_limit: usize,

    /// How long a submitted seal may stay unobserved before it is
    /// re-queued, in seconds.
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            ledger_url: None,
            ledger_timeout_secs: default_ledger_timeout(),
            confirmation_threshold: default_confirmation_threshold(),
            batch_limit: default_seal_batch(),
            grace_period_secs: default_grace_period(),
        }
    }
}

fn default_ledger_timeout() -> u64 {
    30
}

fn default_confirmation_threshold() -> i64 {
    6
}

fn default_seal_batch() -> usize {
    20
}

fn default_grace_period() -> u64 {
    3600
}

/// Scheduled job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JobsConfig {
    /// Period for the delivery retry sweep, in seconds.
    #[serde(default = "default_retry_period")]
    pub retry_delivery_secs: u64,

    /// Period for ledger confirmation polling, in seconds.
    #[serde(default = "default_pollchain_period")]
    pub pollchain_secs: u64,

    /// Period for pending-seal submission, in seconds.
    #[serde(default = "default_sealpending_period")]
    pub sealpending_secs: u64,

    /// Period for the stuck-seal check, in seconds.
    #[serde(default = "default_check_failed_period")]
    pub check_failed_seals_secs: u64,

    /// Period for the change-log replication pump, in seconds.
    #[serde(default = "default_replicate_period")]
    pub replicate_secs: u64,

    /// A job stops issuing new work once its remaining budget drops
    /// below this margin, in seconds.
    #[serde(default = "default_safety_margin")]
    pub safety_margin_secs: u64,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retry_delivery_secs: default_retry_period(),
            pollchain_secs: default_pollchain_period(),
            sealpending_secs: default_sealpending_period(),
            check_failed_seals_secs: default_check_failed_period(),
            replicate_secs: default_replicate_period(),
            safety_margin_secs: default_safety_margin(),
        }
    }
}

fn default_retry_period() -> u64 {
    60
}

fn default_pollchain_period() -> u64 {
    300
}

fn default_sealpending_period() -> u64 {
    120
}

fn default_check_failed_period() -> u64 {
    900
}

fn default_replicate_period() -> u64 {
    5
}

fn default_safety_margin() -> u64 {
    20
}
