// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Sealbox exchange node.
//!
//! TOML files merged through Figment with `SEALBOX_` environment
//! variable overrides. See [`model::SealboxConfig`] for the schema.

pub mod loader;
pub mod model;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::SealboxConfig;
