//! CLI subcommand definitions and handlers.
//!
//! Uses clap derive to define the subcommand hierarchy:
//! - `start` (default) -- run the gateway server
//! - `config show|path` -- inspect configuration
//! - `version` -- print build/version info

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

/// TrustLens backend gateway.
#[derive(Parser, Debug)]
#[command(
    name = "tlens",
    version = env!("CARGO_PKG_VERSION"),
    about = "TrustLens — backend gateway for deepfake detection and job-fraud analysis"
)]
pub struct Cli {
    /// Path to a JSON5 configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Start,

    /// Read configuration values.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Print version, build date, and git commit information.
    Version,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the fully loaded configuration (secrets redacted) as JSON.
    Show,

    /// Print the resolved configuration file path.
    Path,
}

// ---------------------------------------------------------------------------
// Subcommand handlers
// ---------------------------------------------------------------------------

use crate::config::{self, Config};
use serde_json::Value;

/// Config keys whose values are redacted when printing.
const SECRET_KEYS: &[&str] = &["apiKey", "apikey", "api_key"];

/// Print version, git commit, and build date.
pub fn run_version() {
    println!(
        "tlens {} (commit {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("TRUSTLENS_GIT_HASH"),
        env!("TRUSTLENS_BUILD_DATE")
    );
}

/// Print the loaded configuration as pretty JSON with secrets redacted.
pub fn run_config_show(config: &Config) -> Result<(), serde_json::Error> {
    let mut value = serde_json::to_value(config)?;
    redact_secrets(&mut value);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Print the resolved configuration file path, if any.
pub fn run_config_path(explicit: Option<&Path>) {
    match config::resolve_config_path(explicit) {
        Some(path) => println!("{}", path.display()),
        None => println!("(no config file; defaults in effect)"),
    }
}

/// Replace secret values in a JSON tree with `***`.
fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let lower = key.to_lowercase();
                if SECRET_KEYS.iter().any(|s| lower == s.to_lowercase()) && child.is_string() {
                    *child = Value::String("***".to_string());
                } else {
                    redact_secrets(child);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_secrets(item);
            }
        }
        _ => {}
    }
}
