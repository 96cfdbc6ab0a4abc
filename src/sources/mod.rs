//! Readers for the raw OS sources a scan draws on.
//!
//! Every reader returns a [`SourceError`] instead of failing the scan. The
//! collectors turn those into absent fields.

pub mod devices;
#[cfg(test)]
pub mod fakes;
pub mod helper;
pub mod kernel;
pub mod mounts;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{locator} is unavailable: {reason}")]
    Unavailable { locator: String, reason: String },
    #[error("{locator} has no usable {what}")]
    Mismatch { locator: String, what: String },
    #[error("{locator} did not finish within {timeout_ms} ms")]
    Timeout { locator: String, timeout_ms: u64 },
}

impl SourceError {
    pub fn unavailable(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unavailable {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    pub fn mismatch(locator: impl Into<String>, what: impl Into<String>) -> Self {
        Self::Mismatch {
            locator: locator.into(),
            what: what.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldMode {
    First,
    /// Keep scanning and return the last match, used to count cpuinfo entries.
    Last,
}

/// Reads a text source line by line. Invalid UTF-8 is replaced rather than
/// ending the read, so one garbled line never hides the rest of the file.
pub fn read_lines(path: &Path) -> Result<Vec<String>, SourceError> {
    let bytes = std::fs::read(path)
        .map_err(|e| SourceError::unavailable(path.display().to_string(), e))?;
    Ok(bytes
        .split(|b| *b == b'\n')
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect())
}

/// Finds a line starting with `prefix` and returns the field right after
/// `sep`, trimmed. Lines whose field is empty are not matches.
pub fn read_field(
    path: &Path,
    prefix: &str,
    sep: &str,
    mode: FieldMode,
) -> Result<String, SourceError> {
    let mut found: Option<String> = None;
    for line in read_lines(path)? {
        if line.is_empty() || !line.starts_with(prefix) {
            continue;
        }
        let Some(value) = section(&line, sep) else {
            continue;
        };
        found = Some(value.to_string());
        if mode == FieldMode::First {
            break;
        }
    }
    found.ok_or_else(|| SourceError::mismatch(path.display().to_string(), prefix))
}

/// Returns the first non-empty line of a file, trimmed.
pub fn read_first_line(path: &Path) -> Result<String, SourceError> {
    read_lines(path)?
        .iter()
        .map(|line| line.trim())
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or_else(|| SourceError::mismatch(path.display().to_string(), "content"))
}

pub fn read_trimmed(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| SourceError::unavailable(path.display().to_string(), e))
}

/// The text between the first `sep` and the next one (or end of line).
pub(crate) fn section<'a>(line: &'a str, sep: &str) -> Option<&'a str> {
    let value = line.split(sep).nth(1)?.trim();
    (!value.is_empty()).then_some(value)
}
