// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_config_path;

/// Command-line arguments for `packline`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "packline",
    version,
    about = "Rebuild, package, sign and verify a desktop app installer.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Packline.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value_os_t = default_config_path())]
    pub config: PathBuf,

    /// Enable code signing (same as `[signing].enabled = true`).
    #[arg(long)]
    pub sign: bool,

    /// Certificate reference; overrides `[signing].certificate`.
    #[arg(long, value_name = "REF", env = "CSC_LINK")]
    pub csc_link: Option<String>,

    /// Certificate passphrase. Never read from the config file.
    #[arg(long, value_name = "PASSWORD", env = "CSC_KEY_PASSWORD", hide_env_values = true)]
    pub csc_key_password: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PACKLINE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the build plan, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
