// src/buildlog/entry.rs

use std::fmt;

use chrono::{DateTime, Local};

/// Severity tag attached to every build log entry.
///
/// Lines coming from external tools are only ever classified as `Info`,
/// `Warning` or `Error` (see [`crate::exec::classify_line`]). `Step` and
/// `Success` are emitted by the pipeline itself for stage banners and
/// confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Step,
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Step => "STEP",
            Severity::Info => "INFO",
            Severity::Success => "OK",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of the user-facing build log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
            severity,
        }
    }

    /// Render as a single log-file line: `[HH:MM:SS] [LEVEL] message`.
    pub fn to_line(&self) -> String {
        format!(
            "[{}] [{}] {}",
            self.timestamp.format("%H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_time_level_and_message() {
        let entry = LogEntry::new(Severity::Warning, "disk almost full");
        let line = entry.to_line();

        assert!(line.ends_with("[WARN] disk almost full"), "got {line}");
        // "[HH:MM:SS] " prefix
        assert_eq!(&line[0..1], "[");
        assert_eq!(&line[9..11], "] ");
    }
}
