// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface used by discovery, dependency repair and
/// the runner's post-condition checks.
pub trait FileSystem: Send + Sync + Debug {
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;

    /// Return a list of entries in a directory.
    /// Returns full paths.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Last modification time of a file or directory.
    fn modified(&self, path: &Path) -> Result<SystemTime>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Recursively copy the directory `from` into `to`, creating `to` and
    /// merging into it if it already exists. Returns the number of files
    /// copied.
    fn copy_dir_all(&self, from: &Path, to: &Path) -> Result<u64>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).with_context(|| format!("reading dir {:?}", path))? {
            let entry = entry?;
            entries.push(entry.path());
        }
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        let meta = fs::metadata(path).with_context(|| format!("reading metadata of {:?}", path))?;
        meta.modified()
            .with_context(|| format!("reading modification time of {:?}", path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).with_context(|| format!("removing dir {:?}", path))
    }

    fn copy_dir_all(&self, from: &Path, to: &Path) -> Result<u64> {
        fs::create_dir_all(to).with_context(|| format!("creating dir {:?}", to))?;

        let mut copied = 0;
        for entry in fs::read_dir(from).with_context(|| format!("reading dir {:?}", from))? {
            let entry = entry?;
            let source = entry.path();
            let target = to.join(entry.file_name());

            // Symlinks are followed: the packaged tree gets real copies.
            if source.is_dir() {
                copied += self.copy_dir_all(&source, &target)?;
            } else {
                fs::copy(&source, &target)
                    .with_context(|| format!("copying {:?} to {:?}", source, target))?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_dir_all_merges_nested_trees() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::create_dir_all(src.path().join("dotenv/lib")).unwrap();
        fs::write(src.path().join("dotenv/lib/main.js"), "module.exports = {}").unwrap();
        fs::write(src.path().join("dotenv/package.json"), "{}").unwrap();
        fs::create_dir_all(dst.path().join("existing")).unwrap();

        let target = dst.path().join("node_modules");
        let copied = RealFileSystem.copy_dir_all(src.path(), &target).unwrap();

        assert_eq!(copied, 2);
        assert!(target.join("dotenv/lib/main.js").is_file());
        assert!(dst.path().join("existing").is_dir());
    }
}
