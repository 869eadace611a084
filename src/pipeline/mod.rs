// src/pipeline/mod.rs

//! The build pipeline.
//!
//! - [`stage`] declares stages and their fallback attempts.
//! - [`plan`] builds the standard packaging plan from the config.
//! - [`context`] is the per-build state, [`signing`] the credential rules.
//! - [`runner`] executes a plan and produces a [`BuildOutcome`].
//! - [`worker`] runs the runner on a background thread.

pub mod context;
pub mod outcome;
pub mod plan;
pub mod runner;
pub mod signing;
pub mod stage;
pub mod worker;

pub use context::PipelineContext;
pub use outcome::{BuildOutcome, BuildStatus, StageReport, StageStatus};
pub use plan::standard_plan;
pub use runner::PipelineRunner;
pub use signing::{SigningConfig, SigningMode};
pub use stage::{Attempt, DependencyRepair, OptionalArgs, Stage, StageKind};
pub use worker::BuildHandle;
