// src/pipeline/outcome.rs

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Succeeded,
    Failed,
    /// Stopped on request; distinct from failure.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    /// Non-critical stage that failed; the build went on.
    Warned,
    Failed,
    Cancelled,
}

/// What happened in one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub name: String,
    pub status: StageStatus,
    /// Number of attempts actually started (0 for internal stages).
    pub attempts_run: usize,
    /// Zero-based index of the attempt that succeeded. Unset for stages
    /// without fallback semantics.
    pub succeeded_attempt: Option<usize>,
}

/// Result of one build. Always produced, whatever happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    pub status: BuildStatus,
    pub artifact_paths: Vec<PathBuf>,
    pub failure_reason: Option<String>,
    pub warnings: Vec<String>,
    pub stages: Vec<StageReport>,
}

impl BuildOutcome {
    /// A failed outcome for a build that never got to run its stages.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: BuildStatus::Failed,
            artifact_paths: Vec::new(),
            failure_reason: Some(reason.into()),
            warnings: Vec::new(),
            stages: Vec::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == BuildStatus::Succeeded
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BuildStatus::Cancelled
    }

    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Process exit code for the CLI: 0 success, 1 failure, 130 cancelled.
    pub fn exit_code(&self) -> i32 {
        match self.status {
            BuildStatus::Succeeded => 0,
            BuildStatus::Failed => 1,
            BuildStatus::Cancelled => 130,
        }
    }
}
