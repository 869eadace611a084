// src/pipeline/worker.rs

//! Running a build on its own background thread.

use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::buildlog::{LogEntry, LogSink};
use crate::errors::Result;
use crate::exec::{CancelFlag, ProcessSlot};

use super::context::PipelineContext;
use super::outcome::BuildOutcome;
use super::runner::PipelineRunner;

/// Owner-side handle of a running build.
///
/// The build runs on a dedicated thread with its own current-thread tokio
/// runtime, so the owner never blocks on it: it polls [`drain_logs`] on a
/// timer and checks [`is_finished`].
///
/// [`drain_logs`]: BuildHandle::drain_logs
/// [`is_finished`]: BuildHandle::is_finished
#[derive(Debug)]
pub struct BuildHandle {
    cancel: CancelFlag,
    process: ProcessSlot,
    sink: LogSink,
    thread: JoinHandle<BuildOutcome>,
}

impl BuildHandle {
    pub fn spawn(runner: PipelineRunner, mut context: PipelineContext) -> Result<Self> {
        let cancel = context.cancel.clone();
        let process = context.process.clone();
        let sink = runner.log().sink().clone();

        let thread = thread::Builder::new()
            .name("packline-build".to_string())
            .spawn(move || {
                let rt = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!(error = %e, "failed to start build runtime");
                        let reason = format!("failed to start build runtime: {e}");
                        runner.log().error(&reason);
                        return BuildOutcome::failed(reason);
                    }
                };
                let outcome = rt.block_on(runner.run(&mut context));
                info!(status = ?outcome.status, "build finished");
                outcome
            })?;

        Ok(Self {
            cancel,
            process,
            sink,
            thread,
        })
    }

    /// Request cancellation and kill the running process tree right away,
    /// without waiting for the worker to notice the flag.
    pub fn cancel(&self) {
        self.cancel.cancel();
        if let Some(termination) = self.process.terminate() {
            debug!(?termination, "terminated running process tree");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Everything logged since the previous call, in order.
    pub fn drain_logs(&self) -> Vec<LogEntry> {
        self.sink.drain()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the build to end. A panicking worker is reported as a failed
    /// build rather than propagated.
    pub fn join(self) -> BuildOutcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("build worker panicked");
                BuildOutcome::failed("build worker panicked")
            }
        }
    }
}
