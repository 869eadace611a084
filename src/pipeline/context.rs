// src/pipeline/context.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use crate::exec::{CancelFlag, ProcessSlot};

use super::signing::SigningConfig;

/// Mutable state of one build. Created per build and owned by the runner
/// while it runs; only `cancel` and `process` are shared with other threads.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub project_root: PathBuf,
    /// Unpacked packaging output (`--dir`), valid once packaging completed.
    pub packaged_root: PathBuf,
    pub signing: SigningConfig,
    pub cancel: CancelFlag,
    /// Process currently run by the executor, for out-of-band termination.
    pub process: ProcessSlot,
    pub artifact_paths: Vec<PathBuf>,
    /// Application directory discovered inside the packaged output.
    pub app_dir: Option<PathBuf>,
    /// Values captured by probe stages, usable as `{name}` placeholders.
    pub variables: BTreeMap<String, String>,
    /// Set when the run starts; freshness checks compare against it.
    pub started_at: SystemTime,
}

impl PipelineContext {
    pub fn new(
        project_root: impl Into<PathBuf>,
        packaged_root: impl Into<PathBuf>,
        signing: SigningConfig,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            packaged_root: packaged_root.into(),
            signing,
            cancel: CancelFlag::new(),
            process: ProcessSlot::new(),
            artifact_paths: Vec::new(),
            app_dir: None,
            variables: BTreeMap::new(),
            started_at: SystemTime::now(),
        }
    }

    /// Value of a `{name}` placeholder, if known.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "project_root" => Some(self.project_root.display().to_string()),
            "packaged_root" => Some(self.packaged_root.display().to_string()),
            "app_dir" => self.app_dir.as_ref().map(|p| p.display().to_string()),
            other => self.variables.get(other).cloned(),
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_and_probed_placeholders() {
        let mut ctx = PipelineContext::new("/proj", "/proj/dist/win-unpacked", SigningConfig::disabled());
        assert_eq!(ctx.lookup("project_root").as_deref(), Some("/proj"));
        assert_eq!(ctx.lookup("app_dir"), None);
        assert_eq!(ctx.lookup("electron_version"), None);

        ctx.set_variable("electron_version", "31.2.0");
        ctx.app_dir = Some(PathBuf::from("/proj/dist/win-unpacked/resources/app"));
        assert_eq!(ctx.lookup("electron_version").as_deref(), Some("31.2.0"));
        assert!(ctx.lookup("app_dir").is_some());
    }
}
