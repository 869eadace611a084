// src/exec/process_tree.rs

//! Terminating a spawned process together with everything it spawned.
//!
//! Packaging tools fork helpers (node-gyp, compilers, signing tools); killing
//! only the direct child leaves orphans holding file locks on the output
//! directory, which then breaks the next attempt. Two strategies, picked at
//! compile time:
//!
//! - Unix: the child is made leader of a new process group at spawn time
//!   ([`isolate`]) and the whole group receives `SIGKILL`.
//! - Windows: `taskkill /F /T` kills the process and its descendant tree.
//!
//! Both are idempotent: a tree that is already gone is reported as
//! [`Termination::AlreadyExited`], not as an error.

use std::io;
use std::sync::{Arc, Mutex};

use tokio::process::Command;
use tracing::{debug, warn};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Terminated,
    AlreadyExited,
}

/// Prepare a command so its whole tree can later be terminated.
#[cfg(unix)]
pub fn isolate(cmd: &mut Command) {
    cmd.process_group(0);
}

/// Prepare a command so its whole tree can later be terminated.
#[cfg(windows)]
pub fn isolate(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NO_WINDOW);
}

/// Forcefully terminate `pid` and all of its descendants.
#[cfg(unix)]
pub fn terminate(pid: u32) -> io::Result<Termination> {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::Pid;

    let raw = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, format!("pid {pid} out of range")))?;
    let target = Pid::from_raw(raw);

    match killpg(target, Signal::SIGKILL) {
        Ok(()) => {
            debug!(pid, "sent SIGKILL to process group");
            Ok(Termination::Terminated)
        }
        Err(Errno::ESRCH) => {
            // No such group: either already gone, or the child never became a
            // group leader. Fall back to the single process.
            match kill(target, Signal::SIGKILL) {
                Ok(()) => Ok(Termination::Terminated),
                Err(Errno::ESRCH) => Ok(Termination::AlreadyExited),
                Err(e) => Err(io::Error::from(e)),
            }
        }
        Err(e) => Err(io::Error::from(e)),
    }
}

/// Forcefully terminate `pid` and all of its descendants.
#[cfg(windows)]
pub fn terminate(pid: u32) -> io::Result<Termination> {
    use std::os::windows::process::CommandExt;

    // 128: "process not found".
    const NOT_FOUND: i32 = 128;

    let output = std::process::Command::new("taskkill")
        .args(["/F", "/T", "/PID", &pid.to_string()])
        .creation_flags(CREATE_NO_WINDOW)
        .output()?;

    match output.status.code() {
        Some(0) => {
            debug!(pid, "taskkill terminated process tree");
            Ok(Termination::Terminated)
        }
        Some(NOT_FOUND) => Ok(Termination::AlreadyExited),
        code => Err(io::Error::other(format!(
            "taskkill exited with {code:?}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

/// The process currently run by the worker, shared with the owner thread so
/// a cancel request can kill the tree without waiting for the worker.
///
/// The worker publishes the pid right after spawning and clears it once the
/// process has been reaped.
#[derive(Debug, Clone, Default)]
pub struct ProcessSlot {
    pid: Arc<Mutex<Option<u32>>>,
}

impl ProcessSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, pid: u32) {
        *self.pid.lock().unwrap_or_else(|p| p.into_inner()) = Some(pid);
    }

    pub fn clear(&self) {
        *self.pid.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    pub fn current(&self) -> Option<u32> {
        *self.pid.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Terminate the published process tree, if any.
    pub fn terminate(&self) -> Option<Termination> {
        let pid = self.current()?;
        match terminate(pid) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(pid, error = %e, "failed to terminate process tree");
                None
            }
        }
    }
}
