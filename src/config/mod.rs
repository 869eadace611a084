// src/config/mod.rs

//! Configuration loading and validation for packline.
//!
//! - `model.rs` maps `Packline.toml` onto `RawConfigFile` / `ConfigFile`.
//! - `loader.rs` reads the file and anchors relative paths.
//! - `validate.rs` turns a raw config into a validated one.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DiscoverySection, LogSection, NativeSection, ProjectSection, RawConfigFile,
    SigningSection, ToolsSection,
};
