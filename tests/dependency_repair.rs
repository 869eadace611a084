// tests/dependency_repair.rs
//
// Discovery and dependency repair against a real directory tree.

use std::fs;
use std::path::Path;

use packline::discovery::{PathDiscovery, RepairAction, RepairReason, VerificationRule, repair_dependencies};
use packline::fs::RealFileSystem;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

#[test]
fn packaged_app_without_marker_gets_a_fresh_copy() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("app/node_modules");
    touch(&source.join("dotenv/lib/main.js"));
    touch(&source.join("express/index.js"));

    let packaged = tmp.path().join("dist/win-unpacked");
    let app = packaged.join("resources/app/app");
    touch(&app.join("server.js"));
    touch(&app.join("node_modules/stale/index.js"));

    let fs_real = RealFileSystem;
    let discovery = PathDiscovery::new(&fs_real);
    let app_root = discovery.find_app_root(&packaged, "server.js").unwrap();
    assert_eq!(app_root, app);

    let target = app_root.join("node_modules");
    assert!(!discovery.is_complete(&target, "dotenv"));

    let action = repair_dependencies(&fs_real, &source, &target, "dotenv").unwrap();

    assert!(matches!(
        action,
        RepairAction::Copied {
            reason: RepairReason::Incomplete,
            files: 2
        }
    ));
    assert!(discovery.is_complete(&target, "dotenv"));
    assert!(target.join("express/index.js").is_file());
    // The incomplete tree was replaced, not merged.
    assert!(!target.join("stale").exists());

    let rule = VerificationRule::dir("dotenv").containing("lib");
    assert_eq!(
        discovery.find_verified(&packaged, &rule),
        Some(target.join("dotenv"))
    );
}

#[test]
fn complete_packaged_dependencies_are_not_copied() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("app/node_modules");
    touch(&source.join("dotenv/lib/main.js"));

    let target = tmp.path().join("packaged/node_modules");
    touch(&target.join("dotenv/lib/main.js"));
    let before = fs::metadata(target.join("dotenv/lib/main.js")).unwrap().modified().unwrap();

    let action = repair_dependencies(&RealFileSystem, &source, &target, "dotenv").unwrap();

    assert_eq!(action, RepairAction::AlreadyComplete);
    let after = fs::metadata(target.join("dotenv/lib/main.js")).unwrap().modified().unwrap();
    assert_eq!(before, after);
}

#[test]
fn missing_source_is_a_verification_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let target = tmp.path().join("packaged/node_modules");

    let err = repair_dependencies(&RealFileSystem, &tmp.path().join("nope"), &target, "dotenv")
        .unwrap_err();

    assert!(err.to_string().starts_with("verification failed"), "{err}");
}

#[test]
fn flattened_layout_is_found_by_recursive_search() {
    let tmp = tempfile::tempdir().unwrap();
    let packaged = tmp.path().join("win-unpacked");
    touch(&packaged.join("resources/custom/b/server.js"));
    touch(&packaged.join("resources/custom/a/server.js"));

    let fs_real = RealFileSystem;
    let root = PathDiscovery::new(&fs_real).find_app_root(&packaged, "server.js").unwrap();

    assert_eq!(root, packaged.join("resources/custom/a"));
}
