// src/lib.rs

pub mod buildlog;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod pipeline;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::buildlog::{BuildLog, LogEntry, LogSink};
use crate::cli::CliArgs;
use crate::config::ConfigFile;
use crate::config::loader::load_and_validate;
use crate::exec::ProcessExecutor;
use crate::fs::{FileSystem, RealFileSystem};
use crate::pipeline::{
    BuildHandle, BuildOutcome, BuildStatus, PipelineContext, PipelineRunner, SigningConfig, Stage,
    standard_plan,
};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading
/// - the standard plan, executor and build log
/// - the background build worker
/// - log polling and Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let cfg = load_and_validate(&args.config)?;
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let stages = standard_plan(&cfg, fs.as_ref());
    let signing = signing_config(&cfg, &args);

    if args.dry_run {
        print_dry_run(&cfg, &stages, &signing);
        return Ok(0);
    }

    let log = BuildLog::with_file(LogSink::new(), &cfg.log_dir())?;
    let log_path = log.file_path().map(Path::to_path_buf);
    info!(log_file = ?log_path, stages = stages.len(), "starting build");

    let context = PipelineContext::new(cfg.project_root(), cfg.packaged_root(), signing);
    let executor = Arc::new(ProcessExecutor::new(context.process.clone()));
    let runner = PipelineRunner::new(stages, executor, fs, log);
    let handle = BuildHandle::spawn(runner, context)?;

    let mut ticker = tokio::time::interval(Duration::from_millis(cfg.log.poll_interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ctrl_c_armed = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Check before draining so the last entries aren't missed.
                let finished = handle.is_finished();
                print_entries(handle.drain_logs());
                if finished {
                    break;
                }
            }
            res = &mut ctrl_c, if ctrl_c_armed => {
                ctrl_c_armed = false;
                match res {
                    Ok(()) => {
                        eprintln!("cancelling build...");
                        handle.cancel();
                    }
                    Err(e) => warn!(error = %e, "failed to listen for Ctrl+C"),
                }
            }
        }
    }

    let outcome = handle.join();
    print_summary(&outcome, log_path.as_deref());
    Ok(outcome.exit_code())
}

/// Config section, overridden by the CLI / environment. The passphrase has
/// no config-file source.
fn signing_config(cfg: &ConfigFile, args: &CliArgs) -> SigningConfig {
    let certificate = args
        .csc_link
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| cfg.signing.certificate.clone());

    SigningConfig {
        enabled: cfg.signing.enabled || args.sign,
        certificate,
        passphrase: args.csc_key_password.clone(),
    }
}

fn print_entries(entries: Vec<LogEntry>) {
    for entry in entries {
        println!("{}", entry.to_line());
    }
}

fn print_summary(outcome: &BuildOutcome, log_path: Option<&Path>) {
    println!();
    match outcome.status {
        BuildStatus::Succeeded => println!("build succeeded"),
        BuildStatus::Failed => println!(
            "build failed: {}",
            outcome.failure_reason.as_deref().unwrap_or("unknown reason")
        ),
        BuildStatus::Cancelled => println!("build cancelled"),
    }
    for path in &outcome.artifact_paths {
        println!("  artifact: {}", path.display());
    }
    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    if let Some(path) = log_path {
        println!("  log: {}", path.display());
    }
}

/// Simple dry-run output: print the stages and their commands.
fn print_dry_run(cfg: &ConfigFile, stages: &[Stage], signing: &SigningConfig) {
    println!("packline dry-run");
    println!("  project.root = {}", cfg.project_root().display());
    println!("  packaged root = {}", cfg.packaged_root().display());
    match signing.resolve() {
        Ok(mode) => println!("  signing = {}", mode.describe()),
        Err(e) => println!("  signing = {e}"),
    }
    println!();

    println!("stages ({}):", stages.len());
    for (index, stage) in stages.iter().enumerate() {
        let mut flags = Vec::new();
        if stage.critical {
            flags.push("critical");
        }
        if stage.signed {
            flags.push("signed");
        }
        if flags.is_empty() {
            println!("  {}. {}", index + 1, stage.name);
        } else {
            println!("  {}. {} [{}]", index + 1, stage.name, flags.join(", "));
        }

        if stage.kind.is_internal() {
            println!("      internal: {:?}", stage.kind);
        }
        for attempt in &stage.attempts {
            let mut line = attempt.program.clone();
            for arg in &attempt.args {
                line.push(' ');
                line.push_str(arg);
            }
            for group in &attempt.optional_args {
                line.push_str(&format!(" [{} if {{{}}} known]", group.args.join(" "), group.variable));
            }
            println!("      cmd: {line}");
            println!("      cwd: {}", attempt.cwd.display());
        }
    }

    debug!("dry-run complete (no execution)");
}
