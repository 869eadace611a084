// src/buildlog/mod.rs

//! User-facing build log.
//!
//! - [`entry`] defines [`LogEntry`] and its [`Severity`] tag.
//! - [`sink`] is the in-memory queue drained by the presentation layer.
//! - [`BuildLog`] is what every pipeline component writes to: it pushes into
//!   the sink and, when configured, appends the same line to a per-build log
//!   file so a failed build stays diagnosable after the process exits.

pub mod entry;
pub mod sink;

use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::Local;
use tracing::{debug, warn};

pub use entry::{LogEntry, Severity};
pub use sink::LogSink;

use crate::errors::Result;

/// Emitter shared by all pipeline components for one build.
#[derive(Debug, Clone)]
pub struct BuildLog {
    sink: LogSink,
    file: Option<Arc<Mutex<LineWriter<File>>>>,
    path: Option<PathBuf>,
}

impl BuildLog {
    /// Log to the sink only.
    pub fn new(sink: LogSink) -> Self {
        Self {
            sink,
            file: None,
            path: None,
        }
    }

    /// Log to the sink and to a fresh `build_<YYYYmmdd_HHMMSS>.log` inside
    /// `dir` (created if missing).
    pub fn with_file(sink: LogSink, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("creating log dir {:?}", dir))?;

        let name = format!("build_{}.log", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening build log {:?}", path))?;

        Ok(Self {
            sink,
            file: Some(Arc::new(Mutex::new(LineWriter::new(file)))),
            path: Some(path),
        })
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Path of the persistent log file, if one is attached.
    pub fn file_path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn emit(&self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry::new(severity, message);
        debug!(target: "packline::buildlog", severity = %entry.severity, "{}", entry.message);

        if let Some(file) = &self.file {
            let line = entry.to_line();
            match file.lock() {
                Ok(mut writer) => {
                    if let Err(e) = writeln!(writer, "{line}") {
                        warn!(error = %e, "failed to append to build log file");
                    }
                }
                Err(_) => warn!("build log file lock poisoned; line kept in memory only"),
            }
        }

        self.sink.push(entry);
    }

    pub fn step(&self, message: impl Into<String>) {
        self.emit(Severity::Step, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(Severity::Success, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Severity::Error, message);
    }
}
