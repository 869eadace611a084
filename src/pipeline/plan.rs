// src/pipeline/plan.rs

//! The standard packaging plan for an electron-builder project.

use std::time::Duration;

use crate::config::ConfigFile;
use crate::discovery::VerificationRule;
use crate::fs::FileSystem;

use super::stage::{Attempt, DependencyRepair, Stage, StageKind};

/// Variable the runtime-version probe stores.
pub const RUNTIME_VERSION_VAR: &str = "electron_version";

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

const TOOL_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the ordered stage list for `cfg`.
///
/// `fs` is consulted for plan-time conditions only (whether the app
/// sub-project has its own `package.json`).
pub fn standard_plan(cfg: &ConfigFile, fs: &dyn FileSystem) -> Vec<Stage> {
    let root = cfg.project_root().to_path_buf();
    let app_dir = cfg.app_dir();
    let npm = cfg.tools.npm.as_str();
    let npx = cfg.tools.npx.as_str();
    let module = cfg.native.module.as_str();
    let target_flag = format!("--{}", cfg.project.target);

    let rebuild = |cwd: &std::path::Path| {
        Attempt::new(npx, cwd)
            .args(["@electron/rebuild", "-f", "-w", module])
            .when_known(RUNTIME_VERSION_VAR, ["-v", "{electron_version}"])
    };

    let prerequisites = Stage::new(
        "check prerequisites",
        StageKind::Prerequisites {
            required_files: cfg.project.required_files.clone(),
        },
    )
    .attempt(
        Attempt::new(cfg.tools.node.as_str(), &root)
            .arg("-v")
            .timeout(TOOL_CHECK_TIMEOUT),
    )
    .attempt(Attempt::new(npm, &root).arg("-v").timeout(TOOL_CHECK_TIMEOUT));

    let mut stages = vec![
        prerequisites,
        Stage::new("clean previous output", StageKind::Clean { dir: cfg.dist_dir() }),
        Stage::new("install dependencies", StageKind::Run)
            .attempt(Attempt::new(npm, &root).arg("install")),
    ];

    if fs.is_file(&app_dir.join("package.json")) {
        stages.push(
            Stage::new("install app dependencies", StageKind::Run)
                .attempt(Attempt::new(npm, &app_dir).arg("install")),
        );
    }

    stages.push(
        Stage::new(
            "detect runtime version",
            StageKind::Probe {
                variable: RUNTIME_VERSION_VAR.to_string(),
            },
        )
        .attempt(
            Attempt::new(npx, &root)
                .args(["electron", "--version"])
                .timeout(PROBE_TIMEOUT),
        ),
    );

    stages.push(
        Stage::new(
            "rebuild native modules",
            StageKind::NativeRebuild {
                artifact: cfg.native_artifact(),
            },
        )
        .critical()
        .attempt(
            rebuild(root.as_path())
                .arg("--module-dir")
                .arg(app_dir.display().to_string()),
        )
        .attempt(Attempt::new(npx, &root).args(["electron-builder", "install-app-deps"]))
        .attempt(rebuild(app_dir.as_path())),
    );

    stages.push(
        Stage::new(
            "package unpacked app",
            StageKind::Package(DependencyRepair {
                sentinel: cfg.discovery.sentinel.clone(),
                dependency_dir: cfg.discovery.dependency_dir.clone(),
                marker: cfg.discovery.marker.clone(),
                source: cfg.dependency_source(),
            }),
        )
        .critical()
        .signed()
        .attempt(Attempt::new(npx, &root).args(["electron-builder", target_flag.as_str(), "--dir"])),
    );

    stages.push(
        Stage::new("rebuild native modules in packaged app", StageKind::Run)
            .attempt(rebuild(root.as_path()).args(["--module-dir", "{app_dir}"])),
    );

    stages.push(
        Stage::new(
            "build installer",
            StageKind::Installer {
                output_dir: cfg.dist_dir(),
                pattern: cfg.project.installer_pattern.clone(),
            },
        )
        .critical()
        .signed()
        .attempt(Attempt::new(npx, &root).args([
            "electron-builder",
            target_flag.as_str(),
            cfg.project.installer_target.as_str(),
            "--prepackaged",
            "{packaged_root}",
        ])),
    );

    stages.push(
        Stage::new(
            "verify packaged dependencies",
            StageKind::Verify {
                rule: VerificationRule::dir(cfg.discovery.marker.clone())
                    .containing(cfg.discovery.marker_contains.clone()),
            },
        )
        .critical(),
    );

    stages
}
