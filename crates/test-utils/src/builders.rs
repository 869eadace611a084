#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use packline::config::{ConfigFile, RawConfigFile};
use packline::pipeline::{Attempt, Stage, StageKind};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(root: impl AsRef<Path>) -> Self {
        let mut config = RawConfigFile::default();
        config.project.root = root.as_ref().to_path_buf();
        Self { config }
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.config.project.target = target.to_string();
        self
    }

    pub fn with_installer_pattern(mut self, pattern: &str) -> Self {
        self.config.project.installer_pattern = pattern.to_string();
        self
    }

    pub fn with_sentinel(mut self, sentinel: &str) -> Self {
        self.config.discovery.sentinel = sentinel.to_string();
        self
    }

    pub fn with_marker(mut self, marker: &str, contains: &str) -> Self {
        self.config.discovery.marker = marker.to_string();
        self.config.discovery.marker_contains = contains.to_string();
        self
    }

    pub fn with_signing(mut self, enabled: bool, certificate: Option<&str>) -> Self {
        self.config.signing.enabled = enabled;
        self.config.signing.certificate = certificate.map(str::to_string);
        self
    }

    pub fn with_tools(mut self, npm: &str, npx: &str) -> Self {
        self.config.tools.npm = npm.to_string();
        self.config.tools.npx = npx.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `Stage`, with short-hands for attempts run from a fixed
/// working directory.
pub struct StageBuilder {
    stage: Stage,
    cwd: PathBuf,
}

impl StageBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            stage: Stage::new(name, StageKind::Run),
            cwd: PathBuf::from("/proj"),
        }
    }

    pub fn critical(mut self) -> Self {
        self.stage.critical = true;
        self
    }

    pub fn signed(mut self) -> Self {
        self.stage.signed = true;
        self
    }

    pub fn kind(mut self, kind: StageKind) -> Self {
        self.stage.kind = kind;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Add an attempt `program args...` run from the builder's cwd.
    pub fn attempt(mut self, program: &str, args: &[&str]) -> Self {
        let attempt = Attempt::new(program, &self.cwd).args(args.iter().copied());
        self.stage.attempts.push(attempt);
        self
    }

    pub fn attempt_with_timeout(mut self, program: &str, args: &[&str], timeout: Duration) -> Self {
        let attempt = Attempt::new(program, &self.cwd)
            .args(args.iter().copied())
            .timeout(timeout);
        self.stage.attempts.push(attempt);
        self
    }

    pub fn raw_attempt(mut self, attempt: Attempt) -> Self {
        self.stage.attempts.push(attempt);
        self
    }

    pub fn build(self) -> Stage {
        self.stage
    }
}
