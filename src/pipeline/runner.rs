// src/pipeline/runner.rs

//! Drives a build: stages in order, attempts in order, the critical /
//! non-critical policy, and the post-conditions attached to stage kinds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::Glob;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::buildlog::BuildLog;
use crate::discovery::{APP_ROOT_CANDIDATES, PathDiscovery, RepairAction, repair_dependencies};
use crate::errors::PacklineError;
use crate::exec::{ExecutorBackend, StepResult, StepStatus};
use crate::fs::FileSystem;

use super::context::PipelineContext;
use super::outcome::{BuildOutcome, BuildStatus, StageReport, StageStatus};
use super::signing::SigningMode;
use super::stage::{DependencyRepair, Stage, StageKind};

/// Why a stage did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StageError {
    Cancelled,
    /// Honours the stage's criticality.
    Failed(String),
    /// Fatal regardless of criticality.
    Verification(String),
}

impl From<PacklineError> for StageError {
    fn from(err: PacklineError) -> Self {
        match err {
            PacklineError::VerificationFailed(msg) => StageError::Verification(msg),
            other => StageError::Failed(other.to_string()),
        }
    }
}

/// Tally of a stage's attempt loop.
#[derive(Debug, Default)]
struct AttemptTally {
    run: usize,
    succeeded: Option<usize>,
}

pub struct PipelineRunner {
    stages: Vec<Stage>,
    executor: Arc<dyn ExecutorBackend>,
    fs: Arc<dyn FileSystem>,
    log: BuildLog,
}

impl PipelineRunner {
    pub fn new(
        stages: Vec<Stage>,
        executor: Arc<dyn ExecutorBackend>,
        fs: Arc<dyn FileSystem>,
        log: BuildLog,
    ) -> Self {
        Self {
            stages,
            executor,
            fs,
            log,
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn log(&self) -> &BuildLog {
        &self.log
    }

    /// Run every stage against `ctx`. Never fails: every error ends up in
    /// the returned [`BuildOutcome`].
    pub async fn run(&self, ctx: &mut PipelineContext) -> BuildOutcome {
        ctx.started_at = std::time::SystemTime::now();
        let mut outcome = BuildOutcome {
            status: BuildStatus::Succeeded,
            artifact_paths: Vec::new(),
            failure_reason: None,
            warnings: Vec::new(),
            stages: Vec::with_capacity(self.stages.len()),
        };

        let signing = match ctx.signing.resolve() {
            Ok(mode) => mode,
            Err(err) => {
                warn!(error = %err, "refusing to start build");
                self.log.error(err.to_string());
                outcome.status = BuildStatus::Failed;
                outcome.failure_reason = Some(err.to_string());
                return outcome;
            }
        };
        if signing != SigningMode::Disabled {
            self.log.info(signing.describe());
        }

        let total = self.stages.len();
        for (index, stage) in self.stages.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return self.cancelled(outcome);
            }

            self.log.step(format!("[{}/{}] {}", index + 1, total, stage.name));
            let span = info_span!("stage", stage = %stage.name, critical = stage.critical);
            let (tally, result) = self.run_stage(stage, ctx, &signing).instrument(span).await;

            let mut report = StageReport {
                name: stage.name.clone(),
                status: StageStatus::Succeeded,
                attempts_run: tally.run,
                succeeded_attempt: tally.succeeded,
            };

            match result {
                Ok(()) => {
                    self.log.success(format!("{} done", stage.name));
                    outcome.stages.push(report);
                }
                Err(StageError::Cancelled) => {
                    report.status = StageStatus::Cancelled;
                    outcome.stages.push(report);
                    return self.cancelled(outcome);
                }
                Err(StageError::Failed(reason)) if !stage.critical => {
                    let warning = format!("{}: {reason}", stage.name);
                    self.log.warn(format!("{warning} (non-critical, continuing)"));
                    report.status = StageStatus::Warned;
                    outcome.warnings.push(warning);
                    outcome.stages.push(report);
                }
                Err(StageError::Failed(reason) | StageError::Verification(reason)) => {
                    let reason = format!("stage '{}' failed: {reason}", stage.name);
                    self.log.error(&reason);
                    report.status = StageStatus::Failed;
                    outcome.stages.push(report);
                    outcome.status = BuildStatus::Failed;
                    outcome.failure_reason = Some(reason);
                    return outcome;
                }
            }
        }

        outcome.artifact_paths = ctx.artifact_paths.clone();
        for path in &outcome.artifact_paths {
            self.log.success(format!("artifact: {}", path.display()));
        }
        if outcome.warnings.is_empty() {
            self.log.success("build succeeded");
        } else {
            self.log.success(format!(
                "build succeeded with {} warning(s)",
                outcome.warnings.len()
            ));
        }
        outcome
    }

    fn cancelled(&self, mut outcome: BuildOutcome) -> BuildOutcome {
        self.log.warn("build cancelled");
        outcome.status = BuildStatus::Cancelled;
        outcome.failure_reason = Some("cancelled".to_string());
        outcome
    }

    async fn run_stage(
        &self,
        stage: &Stage,
        ctx: &mut PipelineContext,
        signing: &SigningMode,
    ) -> (AttemptTally, Result<(), StageError>) {
        let mut tally = AttemptTally::default();

        match &stage.kind {
            StageKind::Clean { dir } => return (tally, self.clean(dir)),
            StageKind::Verify { rule } => {
                let found = PathDiscovery::new(self.fs.as_ref()).find_verified(&ctx.packaged_root, rule);
                let result = match found {
                    Some(path) => {
                        self.log.success(format!("found {rule} at {}", path.display()));
                        Ok(())
                    }
                    None => Err(StageError::Verification(format!(
                        "no {rule} under {}",
                        ctx.packaged_root.display()
                    ))),
                };
                return (tally, result);
            }
            StageKind::Prerequisites { required_files } => {
                let result = self
                    .check_prerequisites(stage, required_files, ctx, &mut tally)
                    .await;
                return (tally, result);
            }
            _ => {}
        }

        let step = match self.run_attempts(stage, ctx, signing, &mut tally).await {
            Ok(step) => step,
            Err(e) => return (tally, Err(e)),
        };

        let result = match &stage.kind {
            StageKind::Probe { variable } => self.store_probe(variable, &step, ctx),
            StageKind::Package(repair) => self.repair_package(repair, ctx),
            StageKind::Installer {
                output_dir,
                pattern,
            } => self.collect_artifacts(output_dir, pattern, ctx),
            // NativeRebuild is checked per attempt in `run_attempts`.
            StageKind::Run
            | StageKind::NativeRebuild { .. }
            | StageKind::Prerequisites { .. }
            | StageKind::Clean { .. }
            | StageKind::Verify { .. } => Ok(()),
        };
        (tally, result)
    }

    /// Run every tool check (no fallback semantics), then look for the
    /// required project files. All problems are reported together.
    async fn check_prerequisites(
        &self,
        stage: &Stage,
        required_files: &[PathBuf],
        ctx: &PipelineContext,
        tally: &mut AttemptTally,
    ) -> Result<(), StageError> {
        let mut missing = Vec::new();

        for attempt in &stage.attempts {
            if ctx.cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            tally.run += 1;

            let spec = match attempt.resolve(ctx) {
                Ok(spec) => spec,
                Err(err) => {
                    self.log.warn(format!("{}: {err}", attempt.program));
                    missing.push(attempt.program.clone());
                    continue;
                }
            };

            let result = self.executor.execute(&spec, &ctx.cancel, &self.log).await;
            match result.status {
                StepStatus::Succeeded => {
                    let version = result.first_line().unwrap_or("found");
                    self.log.success(format!("{}: {version}", spec.program));
                }
                StepStatus::Cancelled => return Err(StageError::Cancelled),
                _ => {
                    self.log.error(format!("{}: not found or not working", spec.program));
                    missing.push(spec.program.clone());
                }
            }
        }

        for file in required_files {
            let path = ctx.project_root.join(file);
            if self.fs.is_file(&path) {
                self.log.success(format!("{} present", file.display()));
            } else {
                self.log.error(format!("{} missing", path.display()));
                missing.push(file.display().to_string());
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StageError::Failed(format!("missing prerequisites: {}", missing.join(", "))))
        }
    }

    /// Try the stage's attempts in order; the first success ends the loop.
    async fn run_attempts(
        &self,
        stage: &Stage,
        ctx: &PipelineContext,
        signing: &SigningMode,
        tally: &mut AttemptTally,
    ) -> Result<StepResult, StageError> {
        let total = stage.attempts.len();
        if total == 0 {
            return Err(StageError::Failed("no attempts declared".to_string()));
        }

        let mut last_failure = String::new();
        for (index, attempt) in stage.attempts.iter().enumerate() {
            if ctx.cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            if total > 1 {
                self.log.info(format!("attempt {}/{}", index + 1, total));
            }
            tally.run += 1;

            let mut spec = match attempt.resolve(ctx) {
                Ok(spec) => spec,
                Err(err) => {
                    self.log.warn(format!("attempt {} skipped: {err}", index + 1));
                    last_failure = err.to_string();
                    continue;
                }
            };
            if stage.signed {
                spec.env.extend(signing.env());
            }

            debug!(attempt = index + 1, cmd = %spec.command_line(), "starting attempt");
            let result = self.executor.execute(&spec, &ctx.cancel, &self.log).await;

            last_failure = match result.status {
                StepStatus::Succeeded => match self.attempt_postcondition(stage, ctx) {
                    Ok(()) => {
                        info!(attempt = index + 1, "attempt succeeded");
                        tally.succeeded = Some(index);
                        return Ok(result);
                    }
                    Err(reason) => {
                        self.log.warn(format!(
                            "attempt {} reported success but {reason}",
                            index + 1
                        ));
                        reason
                    }
                },
                StepStatus::Cancelled => return Err(StageError::Cancelled),
                StepStatus::ToolUnavailable => {
                    self.log
                        .error(format!("attempt {} failed: {} is not available", index + 1, spec.program));
                    format!("{} is not available", spec.program)
                }
                StepStatus::TimedOut => {
                    self.log.warn(format!("attempt {} timed out", index + 1));
                    "timed out".to_string()
                }
                StepStatus::NonZeroExit => {
                    let code = result
                        .exit_code
                        .map_or_else(|| "none".to_string(), |c| c.to_string());
                    self.log
                        .warn(format!("attempt {} failed (exit code {code})", index + 1));
                    format!("exit code {code}")
                }
            };
        }

        let reason = if last_failure.is_empty() {
            format!("all {total} attempt(s) exhausted")
        } else {
            format!("all {total} attempt(s) exhausted; last: {last_failure}")
        };
        Err(StageError::Failed(reason))
    }

    fn clean(&self, dir: &Path) -> Result<(), StageError> {
        if !self.fs.exists(dir) {
            self.log.info(format!("nothing to clean at {}", dir.display()));
            return Ok(());
        }
        self.fs
            .remove_dir_all(dir)
            .map_err(|e| StageError::Failed(format!("removing {}: {e:#}", dir.display())))?;
        self.log.info(format!("removed {}", dir.display()));
        Ok(())
    }

    fn store_probe(
        &self,
        variable: &str,
        step: &StepResult,
        ctx: &mut PipelineContext,
    ) -> Result<(), StageError> {
        let value = step
            .first_line()
            .map(|l| l.strip_prefix('v').unwrap_or(l).to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StageError::Failed(format!("probe for '{variable}' produced no output")))?;

        self.log.info(format!("{variable} = {value}"));
        ctx.set_variable(variable, value);
        Ok(())
    }

    /// Checks that decide whether a successful process actually counts as a
    /// successful attempt. A failure here moves on to the next attempt.
    fn attempt_postcondition(&self, stage: &Stage, ctx: &PipelineContext) -> Result<(), String> {
        match &stage.kind {
            StageKind::NativeRebuild { artifact } => self.check_fresh(artifact, ctx),
            _ => Ok(()),
        }
    }

    /// A tool that reports success without rebuilding leaves a stale binary
    /// behind; only a binary written during this build counts.
    fn check_fresh(&self, artifact: &Path, ctx: &PipelineContext) -> Result<(), String> {
        let modified = self
            .fs
            .modified(artifact)
            .map_err(|e| format!("native artifact {} not readable: {e:#}", artifact.display()))?;

        if modified > ctx.started_at {
            self.log
                .info(format!("native artifact refreshed: {}", artifact.display()));
            Ok(())
        } else {
            Err(format!(
                "native artifact {} is older than this build; rebuild had no effect",
                artifact.display()
            ))
        }
    }

    fn repair_package(
        &self,
        repair: &DependencyRepair,
        ctx: &mut PipelineContext,
    ) -> Result<(), StageError> {
        let discovery = PathDiscovery::new(self.fs.as_ref());
        let app_root = match discovery.find_app_root(&ctx.packaged_root, &repair.sentinel) {
            Ok(dir) => {
                self.log.info(format!("packaged app found at {}", dir.display()));
                ctx.app_dir = Some(dir.clone());
                dir
            }
            Err(err) => {
                let fallback = ctx.packaged_root.join(APP_ROOT_CANDIDATES[0]);
                self.log.warn(format!(
                    "{err}; assuming default layout {}",
                    fallback.display()
                ));
                fallback
            }
        };

        let target = app_root.join(&repair.dependency_dir);
        match repair_dependencies(self.fs.as_ref(), &repair.source, &target, &repair.marker)? {
            RepairAction::AlreadyComplete => {
                self.log
                    .success(format!("packaged dependencies complete ({} present)", repair.marker));
            }
            RepairAction::Copied { reason, files } => {
                self.log.warn(format!(
                    "packaged dependencies were {reason}; copied {files} file(s) into {}",
                    target.display()
                ));
            }
        }
        Ok(())
    }

    fn collect_artifacts(
        &self,
        output_dir: &Path,
        pattern: &str,
        ctx: &mut PipelineContext,
    ) -> Result<(), StageError> {
        let matcher = Glob::new(pattern)
            .map_err(|e| StageError::Failed(format!("invalid installer pattern '{pattern}': {e}")))?
            .compile_matcher();

        let entries = self.fs.read_dir(output_dir).map_err(|e| {
            StageError::Failed(format!("listing {}: {e:#}", output_dir.display()))
        })?;

        let mut found: Vec<_> = entries
            .into_iter()
            .filter(|p| self.fs.is_file(p))
            .filter(|p| p.file_name().is_some_and(|n| matcher.is_match(n)))
            .collect();
        found.sort();

        if found.is_empty() {
            self.log.warn(format!(
                "no files matching '{pattern}' in {}",
                output_dir.display()
            ));
        }
        ctx.artifact_paths.extend(found);
        Ok(())
    }
}
