// src/discovery/mod.rs

//! Locating things inside a packaged output tree.
//!
//! - [`PathDiscovery::find_app_root`] finds the directory holding the
//!   application entry point (the *sentinel* file), trying the known
//!   packaging layouts first and falling back to a recursive search.
//! - [`PathDiscovery::is_complete`] is the completeness signal for a packaged
//!   dependency directory.
//! - [`rule`] holds [`VerificationRule`], used for the final sanity check.
//! - [`repair`] copies the source dependency tree into the package when the
//!   packaged copy is missing or incomplete.
//!
//! Whenever several paths qualify, the smallest one in `Path` ordering
//! (component-wise lexicographic) wins, so results never depend on the order
//! a directory listing happens to return.

pub mod repair;
pub mod rule;

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::errors::{PacklineError, Result};
use crate::fs::FileSystem;

pub use repair::{RepairAction, RepairReason, repair_dependencies};
pub use rule::{EntryKind, VerificationRule};

/// Upper bound on recursion depth; guards against symlink cycles.
const MAX_SEARCH_DEPTH: usize = 32;

/// Layouts the packaging tool is known to produce, relative to the packaged
/// root, in priority order.
pub const APP_ROOT_CANDIDATES: &[&str] = &[
    // ASAR disabled, app sources nested in an extra `app/` folder.
    "resources/app/app",
    // ASAR enabled, nested app folder unpacked next to the archive.
    "resources/app.asar.unpacked/app",
    // ASAR disabled, flattened.
    "resources/app",
    // ASAR enabled, flattened unpacked folder.
    "resources/app.asar.unpacked",
];

#[derive(Debug, Clone, Copy)]
pub struct PathDiscovery<'a> {
    fs: &'a dyn FileSystem,
}

impl<'a> PathDiscovery<'a> {
    pub fn new(fs: &'a dyn FileSystem) -> Self {
        Self { fs }
    }

    /// Find the directory that contains `sentinel` (e.g. `server.js`).
    ///
    /// Returns [`PacklineError::NotFound`] when neither a known layout nor
    /// the recursive search yields a match.
    pub fn find_app_root(&self, packaged_root: &Path, sentinel: &str) -> Result<PathBuf> {
        for candidate in APP_ROOT_CANDIDATES {
            let dir = packaged_root.join(candidate);
            if self.fs.is_file(&dir.join(sentinel)) {
                debug!(dir = ?dir, layout = candidate, "app root matched known layout");
                return Ok(dir);
            }
        }

        debug!(root = ?packaged_root, sentinel, "no known layout matched; searching recursively");
        let hit = self.find_first(packaged_root, |fs, path| {
            fs.is_file(path) && path.file_name().is_some_and(|n| n == sentinel)
        });

        match hit.as_deref().and_then(Path::parent) {
            Some(parent) => Ok(parent.to_path_buf()),
            None => Err(PacklineError::NotFound(packaged_root.join(sentinel))),
        }
    }

    /// Whether `dep_dir/<marker>` exists as a directory.
    pub fn is_complete(&self, dep_dir: &Path, marker: &str) -> bool {
        self.fs.is_dir(&dep_dir.join(marker))
    }

    /// First path under `root` (in `Path` order) satisfying `rule`.
    pub fn find_verified(&self, root: &Path, rule: &VerificationRule) -> Option<PathBuf> {
        self.find_first(root, |fs, path| rule.matches(fs, path))
    }

    /// Recursively collect every path under `root` accepted by `accept` and
    /// return the smallest.
    fn find_first<F>(&self, root: &Path, accept: F) -> Option<PathBuf>
    where
        F: Fn(&dyn FileSystem, &Path) -> bool,
    {
        let mut matches = Vec::new();
        self.collect(root, 0, &accept, &mut matches);
        matches.sort();
        if matches.len() > 1 {
            debug!(count = matches.len(), chosen = ?matches[0], "multiple matches; using lexicographically first");
        }
        matches.into_iter().next()
    }

    fn collect<F>(&self, dir: &Path, depth: usize, accept: &F, out: &mut Vec<PathBuf>)
    where
        F: Fn(&dyn FileSystem, &Path) -> bool,
    {
        if depth > MAX_SEARCH_DEPTH {
            trace!(dir = ?dir, "search depth limit reached");
            return;
        }
        let Ok(entries) = self.fs.read_dir(dir) else {
            return;
        };
        for entry in entries {
            if accept(self.fs, &entry) {
                out.push(entry.clone());
            }
            if self.fs.is_dir(&entry) {
                self.collect(&entry, depth + 1, accept, out);
            }
        }
    }
}
