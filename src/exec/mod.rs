// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines the `ExecutorBackend` trait the pipeline runner talks
//!   to, plus the `CommandSpec` / `StepResult` types crossing it.
//! - [`step`] is the production backend, `ProcessExecutor`, built on
//!   `tokio::process::Command`.
//! - [`classify`] tags output lines as info / warning / error.
//! - [`process_tree`] isolates spawned processes and kills whole trees.
//! - [`cancel`] is the build-wide cancellation flag.

pub mod backend;
pub mod cancel;
pub mod classify;
pub mod process_tree;
pub mod step;

pub use backend::{CommandSpec, ExecutorBackend, StepResult, StepStatus};
pub use cancel::CancelFlag;
pub use classify::classify_line;
pub use process_tree::{ProcessSlot, Termination};
pub use step::ProcessExecutor;
