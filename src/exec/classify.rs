// src/exec/classify.rs

use crate::buildlog::Severity;

/// Glyph the packaging tool prints in front of fatal messages.
pub const FAILURE_GLYPH: char = '⨯';

/// Classify one line of tool output.
///
/// Case-insensitive substring match, first hit wins:
/// `error` or [`FAILURE_GLYPH`] → `Error`, `warn` → `Warning`, otherwise
/// `Info`.
pub fn classify_line(line: &str) -> Severity {
    let lower = line.to_lowercase();
    if lower.contains("error") || line.contains(FAILURE_GLYPH) {
        Severity::Error
    } else if lower.contains("warn") {
        Severity::Warning
    } else {
        Severity::Info
    }
}
