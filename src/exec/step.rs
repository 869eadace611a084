// src/exec/step.rs

//! Running one external command for the pipeline.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, info, warn};

use crate::buildlog::{BuildLog, Severity};
use crate::errors::PacklineError;

use super::backend::{CommandSpec, ExecutorBackend, StepResult, StepStatus};
use super::cancel::CancelFlag;
use super::classify::classify_line;
use super::process_tree::{self, ProcessSlot};

/// How long to wait for a killed process to be reaped.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Production executor: spawns the command, streams stdout and stderr line
/// by line into the build log, and kills the whole process tree on
/// cancellation or timeout.
///
/// The pid of the running process is published in the shared
/// [`ProcessSlot`] for the duration of the run.
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    slot: ProcessSlot,
}

impl ProcessExecutor {
    pub fn new(slot: ProcessSlot) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &ProcessSlot {
        &self.slot
    }

    async fn run(&self, spec: &CommandSpec, cancel: &CancelFlag, log: &BuildLog) -> StepResult {
        log.info(format!("running: {spec}"));
        if cancel.is_cancelled() {
            return StepResult::new(StepStatus::Cancelled, None, Vec::new());
        }

        let mut cmd = Command::new(resolve_program(&spec.program));
        cmd.args(&spec.args)
            .current_dir(&spec.cwd)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        process_tree::isolate(&mut cmd);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(source) => {
                let err = PacklineError::ToolUnavailable {
                    program: spec.program.clone(),
                    source,
                };
                warn!(cmd = %spec.command_line(), error = %err, "spawn failed");
                log.error(err.to_string());
                return StepResult::new(StepStatus::ToolUnavailable, None, Vec::new());
            }
        };

        let pid = child.id();
        if let Some(pid) = pid {
            self.slot.publish(pid);
        }
        debug!(pid, cmd = %spec.command_line(), "process spawned");

        let mut stdout = child.stdout.take().map(BufReader::new);
        let mut stderr = child.stderr.take().map(BufReader::new);
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut lines = Vec::new();
        let deadline = spec.timeout.map(|t| Instant::now() + t);

        // Read both streams until they close, or until we are interrupted.
        let interrupted = loop {
            if stdout.is_none() && stderr.is_none() {
                break None;
            }
            if cancel.is_cancelled() {
                break Some(StepStatus::Cancelled);
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Some(StepStatus::Cancelled),
                _ = wait_deadline(deadline) => break Some(StepStatus::TimedOut),
                line = read_line(&mut stdout, &mut out_buf) => match line {
                    Some(line) => record_line(log, &mut lines, line),
                    None => stdout = None,
                },
                line = read_line(&mut stderr, &mut err_buf) => match line {
                    Some(line) => record_line(log, &mut lines, line),
                    None => stderr = None,
                },
            }
        };

        let waited = match interrupted {
            Some(reason) => Err(reason),
            None => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(StepStatus::Cancelled),
                _ = wait_deadline(deadline) => Err(StepStatus::TimedOut),
                status = child.wait() => Ok(status),
            },
        };

        let waited = match waited {
            Err(reason) => {
                kill_tree(&mut child, pid).await;
                Err(reason)
            }
            reaped => reaped,
        };
        // The pid may be reused from here on.
        self.slot.clear();

        match waited {
            Ok(Ok(status)) => {
                let code = status.code();
                info!(cmd = %spec.command_line(), exit_code = ?code, success = status.success(), "process exited");
                let step_status = if status.success() {
                    StepStatus::Succeeded
                } else {
                    log.warn(match code {
                        Some(code) => format!("{} exited with code {code}", spec.program),
                        None => format!("{} was terminated by a signal", spec.program),
                    });
                    StepStatus::NonZeroExit
                };
                StepResult::new(step_status, code, lines)
            }
            Ok(Err(e)) => {
                warn!(cmd = %spec.command_line(), error = %e, "waiting for process failed");
                log.error(format!("waiting for {} failed: {e}", spec.program));
                StepResult::new(StepStatus::NonZeroExit, None, lines)
            }
            Err(reason) => {
                match reason {
                    StepStatus::TimedOut => log.error(format!(
                        "{} timed out after {:?}; process tree terminated",
                        spec.program,
                        spec.timeout.unwrap_or_default()
                    )),
                    _ => log.warn(format!("{} cancelled; process tree terminated", spec.program)),
                }
                StepResult::new(reason, None, lines)
            }
        }
    }
}

impl ExecutorBackend for ProcessExecutor {
    fn execute<'a>(
        &'a self,
        spec: &'a CommandSpec,
        cancel: &'a CancelFlag,
        log: &'a BuildLog,
    ) -> Pin<Box<dyn Future<Output = StepResult> + Send + 'a>> {
        Box::pin(self.run(spec, cancel, log))
    }
}

/// `npm`/`npx` are batch shims on Windows and must be invoked as `*.cmd`.
pub fn resolve_program(program: &str) -> String {
    if cfg!(windows) && matches!(program, "npm" | "npx") {
        format!("{program}.cmd")
    } else {
        program.to_string()
    }
}

fn record_line(log: &BuildLog, lines: &mut Vec<(Severity, String)>, line: String) {
    if line.trim().is_empty() {
        return;
    }
    let severity = classify_line(&line);
    log.emit(severity, line.clone());
    lines.push((severity, line));
}

/// Next line from an optional reader; pends forever once the reader is gone
/// so a closed stream simply stops competing in `select!`.
///
/// `buf` is only cleared after a full line was returned: `read_until` may be
/// interrupted by another `select!` branch and keeps its partial bytes there.
async fn read_line<R>(reader: &mut Option<R>, buf: &mut Vec<u8>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let Some(reader) = reader.as_mut() else {
        return std::future::pending().await;
    };

    match reader.read_until(b'\n', buf).await {
        Ok(0) if buf.is_empty() => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(buf)
                .trim_end_matches(['\r', '\n'])
                .to_string();
            buf.clear();
            Some(line)
        }
        Err(e) => {
            debug!(error = %e, "output stream read failed; treating as closed");
            None
        }
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn kill_tree(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        match process_tree::terminate(pid) {
            Ok(outcome) => debug!(pid, ?outcome, "process tree termination"),
            Err(e) => warn!(pid, error = %e, "process tree termination failed"),
        }
    }
    // Covers the case where no pid was available.
    let _ = child.start_kill();
    if timeout(REAP_TIMEOUT, child.wait()).await.is_err() {
        warn!(pid, "killed process was not reaped in time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_resolution_only_touches_npm_shims() {
        assert_eq!(resolve_program("git"), "git");
        if cfg!(windows) {
            assert_eq!(resolve_program("npx"), "npx.cmd");
        } else {
            assert_eq!(resolve_program("npx"), "npx");
        }
    }

    #[tokio::test]
    async fn partial_line_at_eof_is_returned() {
        let data: &[u8] = b"first\r\nlast-without-newline";
        let mut reader = Some(BufReader::new(data));
        let mut buf = Vec::new();

        assert_eq!(read_line(&mut reader, &mut buf).await.as_deref(), Some("first"));
        assert_eq!(
            read_line(&mut reader, &mut buf).await.as_deref(),
            Some("last-without-newline")
        );
        assert_eq!(read_line(&mut reader, &mut buf).await, None);
    }
}
