// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The pipeline runner talks to an `ExecutorBackend` instead of spawning
//! processes itself. Production code uses [`ProcessExecutor`]; tests plug in
//! a scripted fake that records which commands were attempted and returns
//! predetermined results without spawning anything.
//!
//! [`ProcessExecutor`]: super::ProcessExecutor

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::buildlog::{BuildLog, Severity};

use super::cancel::CancelFlag;

/// A fully resolved command: no placeholders left, environment overrides
/// already merged with signing credentials where applicable.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Overrides applied on top of the inherited process environment.
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    /// `program arg1 arg2 ...`, for logs and diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// Environment values may hold credentials; only their names are shown.
impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("cwd", &self.cwd)
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (in {})", self.command_line(), self.cwd.display())
    }
}

/// How one command execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    /// Process ran and exited non-zero (or was killed by a signal).
    NonZeroExit,
    /// The program could not be spawned.
    ToolUnavailable,
    /// The attempt's timeout elapsed; the process tree was terminated.
    TimedOut,
    /// The build's cancel flag was set; the process tree was terminated.
    Cancelled,
}

/// Result of executing one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub status: StepStatus,
    pub exit_code: Option<i32>,
    /// Every non-empty output line, in the order it was read, with its
    /// classification.
    pub lines: Vec<(Severity, String)>,
}

impl StepResult {
    pub fn new(status: StepStatus, exit_code: Option<i32>, lines: Vec<(Severity, String)>) -> Self {
        Self {
            status,
            exit_code,
            lines,
        }
    }

    /// Shorthand for a finished process with the given exit code.
    pub fn exited(code: i32) -> Self {
        let status = if code == 0 {
            StepStatus::Succeeded
        } else {
            StepStatus::NonZeroExit
        };
        Self::new(status, Some(code), Vec::new())
    }

    pub fn succeeded(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// First output line that isn't blank, trimmed. Used by probe stages.
    pub fn first_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(|(_, l)| l.trim())
            .find(|l| !l.is_empty())
    }
}

/// Trait abstracting how a single command is executed.
///
/// Implementations must stream every output line into `log` as it arrives,
/// and must stop promptly once `cancel` is set.
pub trait ExecutorBackend: Send + Sync {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        cancel: &'a CancelFlag,
        log: &'a BuildLog,
    ) -> Pin<Box<dyn Future<Output = StepResult> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_environment_values() {
        let spec = CommandSpec {
            program: "npx".into(),
            args: vec!["electron-builder".into(), "--dir".into()],
            cwd: PathBuf::from("/proj"),
            env: BTreeMap::from([("CSC_KEY_PASSWORD".to_string(), "hunter2".to_string())]),
            timeout: None,
        };

        let dbg = format!("{spec:?}");
        assert!(dbg.contains("CSC_KEY_PASSWORD"));
        assert!(!dbg.contains("hunter2"));
        assert_eq!(spec.to_string(), "npx electron-builder --dir (in /proj)");
    }
}
