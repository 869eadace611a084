// src/discovery/rule.rs

use std::fmt;
use std::path::{Path, PathBuf};

use crate::fs::FileSystem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// "An entry named `name`, of kind `kind`, optionally containing
/// `must_contain`" — e.g. a `dotenv` directory that contains `lib`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRule {
    pub name: String,
    pub kind: EntryKind,
    pub must_contain: Option<PathBuf>,
}

impl VerificationRule {
    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Dir,
            must_contain: None,
        }
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
            must_contain: None,
        }
    }

    pub fn containing(mut self, subpath: impl Into<PathBuf>) -> Self {
        self.must_contain = Some(subpath.into());
        self
    }

    /// Whether `path` itself satisfies the rule.
    pub fn matches(&self, fs: &dyn FileSystem, path: &Path) -> bool {
        if path.file_name().is_none_or(|n| n != self.name.as_str()) {
            return false;
        }
        let kind_ok = match self.kind {
            EntryKind::File => fs.is_file(path),
            EntryKind::Dir => fs.is_dir(path),
        };
        kind_ok
            && self
                .must_contain
                .as_ref()
                .is_none_or(|sub| fs.exists(&path.join(sub)))
    }
}

impl fmt::Display for VerificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            EntryKind::File => "file",
            EntryKind::Dir => "directory",
        };
        write!(f, "{kind} '{}'", self.name)?;
        if let Some(sub) = &self.must_contain {
            write!(f, " containing '{}'", sub.display())?;
        }
        Ok(())
    }
}
