// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PacklineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// The program of an attempt could not be spawned (e.g. not on `PATH`).
    #[error("tool unavailable: {program}: {source}")]
    ToolUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An attempt argument references a context variable that is not known.
    #[error("unresolved placeholder '{{{0}}}' in command arguments")]
    UnresolvedPlaceholder(String),

    #[error("invalid signing configuration: {0}")]
    InvalidSigning(String),

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PacklineError>;
