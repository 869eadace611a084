// src/discovery/repair.rs

use std::fmt;
use std::path::Path;

use tracing::info;

use crate::errors::{PacklineError, Result};
use crate::fs::FileSystem;

use super::PathDiscovery;

/// Why a packaged dependency directory had to be replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairReason {
    /// The packaged dependency directory does not exist.
    Missing,
    /// It exists but lacks the marker dependency.
    Incomplete,
}

impl fmt::Display for RepairReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepairReason::Missing => f.write_str("missing"),
            RepairReason::Incomplete => f.write_str("incomplete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairAction {
    /// Marker already present; nothing copied.
    AlreadyComplete,
    Copied { reason: RepairReason, files: u64 },
}

/// Make `target` a complete dependency directory.
///
/// Copies `source` over `target` iff `target` is absent, or present but
/// without `marker`. An incomplete `target` is removed first so stale
/// partial installs don't linger. After copying, the marker must be present;
/// otherwise this is a verification failure. Every filesystem error is
/// reported as [`PacklineError::VerificationFailed`] with its cause.
pub fn repair_dependencies(
    fs: &dyn FileSystem,
    source: &Path,
    target: &Path,
    marker: &str,
) -> Result<RepairAction> {
    let discovery = PathDiscovery::new(fs);

    let reason = if !fs.is_dir(target) {
        RepairReason::Missing
    } else if !discovery.is_complete(target, marker) {
        RepairReason::Incomplete
    } else {
        return Ok(RepairAction::AlreadyComplete);
    };

    if !fs.is_dir(source) {
        return Err(PacklineError::VerificationFailed(format!(
            "packaged dependencies are {reason} and source {} does not exist",
            source.display()
        )));
    }

    info!(?source, ?target, %reason, "repairing packaged dependency directory");

    let copy = || -> anyhow::Result<u64> {
        if reason == RepairReason::Incomplete {
            fs.remove_dir_all(target)?;
        }
        if let Some(parent) = target.parent() {
            fs.create_dir_all(parent)?;
        }
        fs.copy_dir_all(source, target)
    };

    let files = copy().map_err(|e| {
        PacklineError::VerificationFailed(format!(
            "copying {} to {} failed: {e:#}",
            source.display(),
            target.display()
        ))
    })?;

    if !discovery.is_complete(target, marker) {
        return Err(PacklineError::VerificationFailed(format!(
            "'{marker}' still missing from {} after repair",
            target.display()
        )));
    }

    Ok(RepairAction::Copied { reason, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    const SRC: &str = "/project/app/node_modules";
    const DST: &str = "/dist/win-unpacked/resources/app/app/node_modules";

    fn source_tree() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{SRC}/dotenv/lib/main.js"), "");
        fs.add_file(format!("{SRC}/express/index.js"), "");
        fs
    }

    #[test]
    fn missing_target_is_copied() {
        let fs = source_tree();

        let action = repair_dependencies(&fs, Path::new(SRC), Path::new(DST), "dotenv").unwrap();

        assert_eq!(
            action,
            RepairAction::Copied {
                reason: RepairReason::Missing,
                files: 2
            }
        );
        assert!(PathDiscovery::new(&fs).is_complete(Path::new(DST), "dotenv"));
    }

    #[test]
    fn incomplete_target_is_replaced() {
        let fs = source_tree();
        fs.add_file(format!("{DST}/stale/index.js"), "");

        let action = repair_dependencies(&fs, Path::new(SRC), Path::new(DST), "dotenv").unwrap();

        assert!(matches!(
            action,
            RepairAction::Copied {
                reason: RepairReason::Incomplete,
                ..
            }
        ));
        assert!(!fs.exists(Path::new(&format!("{DST}/stale"))));
        assert!(fs.is_dir(Path::new(&format!("{DST}/dotenv"))));
    }

    #[test]
    fn complete_target_is_left_alone() {
        let fs = source_tree();
        fs.add_file(format!("{DST}/dotenv/lib/main.js"), "");

        let action = repair_dependencies(&fs, Path::new(SRC), Path::new(DST), "dotenv").unwrap();

        assert_eq!(action, RepairAction::AlreadyComplete);
        assert!(fs.copies().is_empty());
    }

    #[test]
    fn source_without_marker_fails_verification() {
        let fs = MockFileSystem::new();
        fs.add_file(format!("{SRC}/express/index.js"), "");

        let err = repair_dependencies(&fs, Path::new(SRC), Path::new(DST), "dotenv").unwrap_err();
        assert!(matches!(err, PacklineError::VerificationFailed(_)));
    }
}
