// src/config/validate.rs

use std::path::Path;

use globset::Glob;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PacklineError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PacklineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_names(cfg)?;
    validate_relative_paths(cfg)?;
    validate_installer_pattern(cfg)?;
    validate_log(cfg)?;
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    let names = [
        ("[project].target", cfg.project.target.as_str()),
        ("[project].installer_target", cfg.project.installer_target.as_str()),
        ("[native].module", cfg.native.module.as_str()),
        ("[discovery].sentinel", cfg.discovery.sentinel.as_str()),
        ("[discovery].marker", cfg.discovery.marker.as_str()),
        ("[tools].node", cfg.tools.node.as_str()),
        ("[tools].npm", cfg.tools.npm.as_str()),
        ("[tools].npx", cfg.tools.npx.as_str()),
    ];
    for (key, value) in names {
        if value.trim().is_empty() {
            return Err(PacklineError::ConfigError(format!("{key} must not be empty")));
        }
    }

    // Both are matched against single path components.
    for (key, value) in [
        ("[discovery].sentinel", cfg.discovery.sentinel.as_str()),
        ("[discovery].marker", cfg.discovery.marker.as_str()),
    ] {
        if value.contains(['/', '\\']) {
            return Err(PacklineError::ConfigError(format!(
                "{key} must be a plain file name, got '{value}'"
            )));
        }
    }
    Ok(())
}

fn validate_relative_paths(cfg: &RawConfigFile) -> Result<()> {
    let paths: [(&str, &Path); 6] = [
        ("[project].app_dir", cfg.project.app_dir.as_path()),
        ("[project].dist_dir", cfg.project.dist_dir.as_path()),
        ("[project].packaged_dir", cfg.project.packaged_dir.as_path()),
        ("[native].artifact", cfg.native.artifact.as_path()),
        ("[discovery].dependency_dir", cfg.discovery.dependency_dir.as_path()),
        ("[discovery].marker_contains", Path::new(&cfg.discovery.marker_contains)),
    ];
    let required = cfg
        .project
        .required_files
        .iter()
        .map(|p| ("[project].required_files", p.as_path()));
    for (key, path) in paths.into_iter().chain(required) {
        if path.as_os_str().is_empty() {
            return Err(PacklineError::ConfigError(format!("{key} must not be empty")));
        }
        if path.is_absolute() {
            return Err(PacklineError::ConfigError(format!(
                "{key} must be a relative path, got {:?}",
                path
            )));
        }
    }
    Ok(())
}

fn validate_installer_pattern(cfg: &RawConfigFile) -> Result<()> {
    Glob::new(&cfg.project.installer_pattern).map_err(|e| {
        PacklineError::ConfigError(format!(
            "[project].installer_pattern '{}' is not a valid glob: {e}",
            cfg.project.installer_pattern
        ))
    })?;
    Ok(())
}

fn validate_log(cfg: &RawConfigFile) -> Result<()> {
    if cfg.log.poll_interval_ms == 0 {
        return Err(PacklineError::ConfigError(
            "[log].poll_interval_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
