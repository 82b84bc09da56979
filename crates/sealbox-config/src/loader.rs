// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sealbox.toml` > `~/.config/sealbox/sealbox.toml`
//! > `/etc/sealbox/sealbox.toml` with environment variable overrides via
//! the `SEALBOX_` prefix.

#![allow(clippy::result_large_err)]

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SealboxConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sealbox/sealbox.toml` (system-wide)
/// 3. `~/.config/sealbox/sealbox.toml` (user XDG config)
/// 4. `./sealbox.toml` (local directory)
/// 5. `SEALBOX_*` environment variables
pub fn load_config() -> Result<SealboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SealboxConfig::default()))
        .merge(Toml::file("/etc/sealbox/sealbox.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sealbox/sealbox.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sealbox.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit inline configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<SealboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SealboxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SealboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SealboxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SEALBOX_STORAGE_DATABASE_PATH` must
/// map to `storage.database_path`, not `storage.database.path`.
fn env_provider() -> Env {
    Env::prefixed("SEALBOX_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("node_", "node.", 1)
            .replacen("gateway_", "gateway.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("auth_", "auth.", 1)
            .replacen("delivery_", "delivery.", 1)
            .replacen("seal_", "seal.", 1)
            .replacen("jobs_", "jobs.", 1);
        mapped.into()
    })
}
