// tests/runner_fake_executor.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use packline::buildlog::{BuildLog, LogSink, Severity};
use packline::discovery::VerificationRule;
use packline::fs::mock::MockFileSystem;
use packline::pipeline::{
    Attempt, BuildStatus, PipelineContext, PipelineRunner, SigningConfig, Stage, StageKind,
    StageStatus,
};
use packline_test_utils::builders::StageBuilder;
use packline_test_utils::fake_executor::{
    ScriptedExecutor, step_failed, step_ok, step_with_output, tool_unavailable,
};
use packline_test_utils::{init_tracing, with_timeout};

fn runner(
    stages: Vec<Stage>,
    exec: &Arc<ScriptedExecutor>,
    fs: &MockFileSystem,
) -> (PipelineRunner, LogSink) {
    let sink = LogSink::new();
    let runner = PipelineRunner::new(
        stages,
        exec.clone(),
        Arc::new(fs.clone()),
        BuildLog::new(sink.clone()),
    );
    (runner, sink)
}

fn context() -> PipelineContext {
    PipelineContext::new("/proj", "/proj/dist/win-unpacked", SigningConfig::disabled())
}

#[tokio::test]
async fn attempts_stop_at_first_success() {
    init_tracing();

    let exec = Arc::new(
        ScriptedExecutor::new()
            .respond("first", [step_failed(1)])
            .respond("second", [step_ok()]),
    );
    let stage = StageBuilder::new("fallbacks")
        .critical()
        .attempt("tool", &["first"])
        .attempt("tool", &["second"])
        .attempt("tool", &["third"])
        .build();
    let (runner, _sink) = runner(vec![stage], &exec, &MockFileSystem::new());

    let outcome = with_timeout(runner.run(&mut context())).await;

    assert!(outcome.success());
    assert_eq!(exec.command_lines(), ["tool first", "tool second"]);
    let report = outcome.stage("fallbacks").unwrap();
    assert_eq!(report.attempts_run, 2);
    assert_eq!(report.succeeded_attempt, Some(1));
}

#[tokio::test]
async fn exhausted_critical_stage_aborts_the_build() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new().respond("broken", [step_failed(2), step_failed(3)]));
    let stages = vec![
        StageBuilder::new("critical")
            .critical()
            .attempt("broken", &["a"])
            .attempt("broken", &["b"])
            .build(),
        StageBuilder::new("later").attempt("never", &[]).build(),
    ];
    let (runner, sink) = runner(stages, &exec, &MockFileSystem::new());

    let outcome = runner.run(&mut context()).await;

    assert_eq!(outcome.status, BuildStatus::Failed);
    assert!(outcome.failure_reason.as_deref().unwrap().contains("critical"));
    assert_eq!(exec.command_lines(), ["broken a", "broken b"]);
    assert!(outcome.stage("later").is_none());
    assert!(
        sink.drain()
            .iter()
            .any(|e| e.severity == Severity::Error && e.message.contains("stage 'critical' failed"))
    );
}

#[tokio::test]
async fn failing_optional_stage_is_a_warning() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new().respond("flaky", [step_failed(1)]));
    let stages = vec![
        StageBuilder::new("optional").attempt("flaky", &[]).build(),
        StageBuilder::new("required").critical().attempt("solid", &[]).build(),
    ];
    let (runner, sink) = runner(stages, &exec, &MockFileSystem::new());

    let outcome = runner.run(&mut context()).await;

    assert!(outcome.success());
    assert_eq!(outcome.warnings.len(), 1);
    assert!(outcome.warnings[0].starts_with("optional:"));
    assert_eq!(outcome.stage("optional").unwrap().status, StageStatus::Warned);
    assert_eq!(outcome.stage("required").unwrap().status, StageStatus::Succeeded);
    assert!(sink.drain().iter().any(|e| e.severity == Severity::Warning));
}

#[tokio::test]
async fn missing_tool_moves_on_to_next_attempt() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new().respond("missing", [tool_unavailable()]));
    let stage = StageBuilder::new("tools")
        .critical()
        .attempt("missing", &[])
        .attempt("present", &[])
        .build();
    let (runner, sink) = runner(vec![stage], &exec, &MockFileSystem::new());

    let outcome = runner.run(&mut context()).await;

    assert!(outcome.success());
    assert_eq!(outcome.stage("tools").unwrap().succeeded_attempt, Some(1));
    assert!(
        sink.drain()
            .iter()
            .any(|e| e.severity == Severity::Error && e.message.contains("not available"))
    );
}

#[tokio::test]
async fn cancelled_flag_stops_before_next_stage() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![StageBuilder::new("first").attempt("tool", &[]).build()];
    let (runner, _sink) = runner(stages, &exec, &MockFileSystem::new());

    let mut ctx = context();
    ctx.cancel.cancel();
    let outcome = runner.run(&mut ctx).await;

    assert_eq!(outcome.status, BuildStatus::Cancelled);
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.exit_code(), 130);
    assert!(exec.calls().is_empty());
}

#[tokio::test]
async fn cancellation_mid_attempt_is_not_retried() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new().hang("slow"));
    let stages = vec![
        StageBuilder::new("hangs")
            .critical()
            .attempt("slow", &[])
            .attempt("fallback", &[])
            .build(),
        StageBuilder::new("after").attempt("tool", &[]).build(),
    ];
    let (runner, _sink) = runner(stages, &exec, &MockFileSystem::new());

    let mut ctx = context();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let outcome = with_timeout(runner.run(&mut ctx)).await;

    assert_eq!(outcome.status, BuildStatus::Cancelled);
    assert_eq!(exec.command_lines(), ["slow"]);
    assert_eq!(outcome.stage("hangs").unwrap().status, StageStatus::Cancelled);
}

#[tokio::test]
async fn verification_failure_is_fatal_even_when_not_critical() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_dir("/proj/dist/win-unpacked/resources/app/node_modules/dotenv");
    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![
        // Declared non-critical on purpose.
        Stage::new(
            "verify",
            StageKind::Verify {
                rule: VerificationRule::dir("dotenv").containing("lib"),
            },
        ),
        StageBuilder::new("after").attempt("tool", &[]).build(),
    ];
    let (runner, _sink) = runner(stages, &exec, &fs);

    let outcome = runner.run(&mut context()).await;

    assert_eq!(outcome.status, BuildStatus::Failed);
    assert!(outcome.failure_reason.unwrap().contains("directory 'dotenv' containing 'lib'"));
    assert!(exec.calls().is_empty());
}

#[tokio::test]
async fn probe_output_feeds_later_placeholders() {
    init_tracing();

    let exec = Arc::new(
        ScriptedExecutor::new().respond("--version", [step_with_output(0, &["", "v31.2.0"])]),
    );
    let stages = vec![
        Stage::new(
            "probe",
            StageKind::Probe {
                variable: "electron_version".into(),
            },
        )
        .attempt(Attempt::new("npx", "/proj").args(["electron", "--version"])),
        Stage::new("use", StageKind::Run).critical().attempt(
            Attempt::new("npx", "/proj")
                .arg("@electron/rebuild")
                .when_known("electron_version", ["-v", "{electron_version}"]),
        ),
    ];
    let (runner, _sink) = runner(stages, &exec, &MockFileSystem::new());

    let mut ctx = context();
    let outcome = runner.run(&mut ctx).await;

    assert!(outcome.success());
    assert_eq!(ctx.variables.get("electron_version").map(String::as_str), Some("31.2.0"));
    assert_eq!(exec.command_lines()[1], "npx @electron/rebuild -v 31.2.0");
}

#[tokio::test]
async fn unresolved_placeholder_counts_as_failed_attempt() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new());
    let stage = Stage::new("needs app dir", StageKind::Run)
        .attempt(Attempt::new("npx", "/proj").args(["--module-dir", "{app_dir}"]));
    let (runner, _sink) = runner(vec![stage], &exec, &MockFileSystem::new());

    let outcome = runner.run(&mut context()).await;

    // Non-critical: the build still succeeds, but nothing was executed.
    assert!(outcome.success());
    assert!(exec.calls().is_empty());
    assert!(outcome.warnings[0].contains("needs app dir"));
    assert_eq!(outcome.stage("needs app dir").unwrap().attempts_run, 1);
}

#[tokio::test]
async fn credentials_reach_only_signed_stages() {
    init_tracing();

    let exec = Arc::new(ScriptedExecutor::new());
    let stages = vec![
        StageBuilder::new("plain").attempt("npm", &["install"]).build(),
        StageBuilder::new("package").signed().attempt("npx", &["electron-builder"]).build(),
    ];
    let (runner, _sink) = runner(stages, &exec, &MockFileSystem::new());

    let mut ctx = PipelineContext::new(
        "/proj",
        "/proj/dist/win-unpacked",
        SigningConfig::enabled(Some("cert.pfx".into()), Some("secret".into())),
    );
    let outcome = runner.run(&mut ctx).await;

    assert!(outcome.success());
    let calls = exec.calls();
    assert!(calls[0].env.is_empty());
    assert_eq!(calls[1].env.get("CSC_LINK").map(String::as_str), Some("cert.pfx"));
    assert_eq!(calls[1].env.get("CSC_KEY_PASSWORD").map(String::as_str), Some("secret"));
}

#[tokio::test]
async fn installer_artifacts_are_collected_sorted() {
    init_tracing();

    let fs = MockFileSystem::new();
    let exec = Arc::new({
        let fs = fs.clone();
        ScriptedExecutor::new().on_success("nsis", move |_| {
            fs.add_file("/proj/dist/App Setup 1.1.0.exe", "");
            fs.add_file("/proj/dist/App Setup 1.0.0.exe", "");
            fs.add_file("/proj/dist/latest.yml", "");
        })
    });
    let stage = StageBuilder::new("installer")
        .critical()
        .kind(StageKind::Installer {
            output_dir: PathBuf::from("/proj/dist"),
            pattern: "*.exe".into(),
        })
        .attempt("npx", &["electron-builder", "nsis"])
        .build();
    let (runner, _sink) = runner(vec![stage], &exec, &fs);

    let outcome = runner.run(&mut context()).await;

    assert_eq!(
        outcome.artifact_paths,
        [
            PathBuf::from("/proj/dist/App Setup 1.0.0.exe"),
            PathBuf::from("/proj/dist/App Setup 1.1.0.exe"),
        ]
    );
}

#[tokio::test]
async fn stale_native_binary_moves_on_to_next_attempt() {
    init_tracing();

    let artifact = "/proj/app/build/Release/addon.node";
    let fs = MockFileSystem::new();
    fs.add_file_modified(artifact, "old", UNIX_EPOCH + Duration::from_secs(60));

    let exec = Arc::new({
        let fs = fs.clone();
        ScriptedExecutor::new().on_success("second", move |_| {
            fs.add_file_modified(artifact, "new", SystemTime::now() + Duration::from_secs(1));
        })
    });
    let stage = StageBuilder::new("rebuild")
        .critical()
        .kind(StageKind::NativeRebuild {
            artifact: PathBuf::from(artifact),
        })
        .attempt("rebuild", &["first"])
        .attempt("rebuild", &["second"])
        .attempt("rebuild", &["third"])
        .build();
    let (runner, sink) = runner(vec![stage], &exec, &fs);

    let outcome = with_timeout(runner.run(&mut context())).await;

    assert!(outcome.success(), "{outcome:?}");
    assert_eq!(exec.command_lines(), ["rebuild first", "rebuild second"]);
    let report = outcome.stage("rebuild").unwrap();
    assert_eq!(report.attempts_run, 2);
    assert_eq!(report.succeeded_attempt, Some(1));
    assert!(sink.drain().iter().any(|e| {
        e.severity == Severity::Warning
            && e.message.starts_with("attempt 1 reported success but")
            && e.message.contains("older than this build")
    }));
}

#[tokio::test]
async fn prerequisite_checks_all_run_and_report_together() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("/proj/package.json", "{}");
    let exec = Arc::new(
        ScriptedExecutor::new()
            .respond("node", [tool_unavailable()])
            .respond("npm", [step_with_output(0, &["10.8.1"])]),
    );
    let stages = vec![
        Stage::new(
            "check prerequisites",
            StageKind::Prerequisites {
                required_files: vec!["package.json".into(), "electron/main.js".into()],
            },
        )
        .attempt(Attempt::new("node", "/proj").arg("-v"))
        .attempt(Attempt::new("npm", "/proj").arg("-v")),
        StageBuilder::new("after").attempt("tool", &[]).build(),
    ];
    let (runner, sink) = runner(stages, &exec, &fs);

    let outcome = runner.run(&mut context()).await;

    // Non-critical: reported, then the build carries on.
    assert!(outcome.success());
    assert_eq!(exec.command_lines(), ["node -v", "npm -v", "tool"]);
    assert_eq!(
        outcome.warnings,
        ["check prerequisites: missing prerequisites: node, electron/main.js"]
    );
    let messages: Vec<_> = sink.drain().into_iter().map(|e| e.message).collect();
    assert!(messages.iter().any(|m| m == "npm: 10.8.1"));
    assert!(messages.iter().any(|m| m == "package.json present"));
}
