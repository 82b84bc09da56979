// SPDX-FileCopyrightText: 2026 Sealbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sealbox - a peer-to-peer signed-document exchange node.
//!
//! This is the binary entry point for the Sealbox node.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod serve;

/// Sealbox - a peer-to-peer signed-document exchange node.
#[derive(Parser, Debug)]
#[command(name = "sealbox", version, about, long_about = None)]
struct Cli {
    /// Path to a configuration file (overrides the XDG hierarchy).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the Sealbox exchange node.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => sealbox_config::load_config_from_path(path),
        None => sealbox_config::load_config(),
    };
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sealbox: invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("sealbox serve: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("sealbox: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        let config = sealbox_config::load_config_from_str("").expect("defaults are valid");
        assert_eq!(config.node.name, "sealbox");
    }
}
