//! Artifact filename resolution and validation.

use chrono::{DateTime, Local};
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "AI_Report_";
pub const EXTENSION: &str = ".pdf";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("Filename must not be empty")]
    Empty,

    #[error("Filename '{0}' must not contain path separators")]
    Separator(String),

    #[error("Filename '{0}' must not contain '..'")]
    ParentReference(String),

    #[error("Filename must not contain NUL bytes")]
    Nul,
}

/// Where a resolved name came from. Decides the store's write policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOrigin {
    Caller,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub filename: String,
    pub origin: NameOrigin,
}

/// Rejects anything that could escape the flat output directory.
pub fn validate(name: &str) -> Result<(), NameError> {
    if name.trim().is_empty() {
        return Err(NameError::Empty);
    }
    if name.contains('\0') {
        return Err(NameError::Nul);
    }
    if name.contains('/') || name.contains('\\') {
        return Err(NameError::Separator(name.to_string()));
    }
    if name.contains("..") {
        return Err(NameError::ParentReference(name.to_string()));
    }
    Ok(())
}

pub fn has_pdf_extension(name: &str) -> bool {
    name.len() >= EXTENSION.len()
        && name
            .get(name.len() - EXTENSION.len()..)
            .is_some_and(|ext| ext.eq_ignore_ascii_case(EXTENSION))
}

/// `AI_Report_YYYYMMDD_HHMMSS.pdf`
pub fn timestamp_name(now: DateTime<Local>) -> String {
    format!("{DEFAULT_PREFIX}{}{EXTENSION}", now.format("%Y%m%d_%H%M%S"))
}

/// Caller names are kept verbatim (plus `.pdf` if missing); otherwise a
/// timestamp name is generated.
pub fn resolve(requested: Option<&str>, now: DateTime<Local>) -> Result<ResolvedName, NameError> {
    match requested {
        Some(name) => {
            validate(name)?;
            let filename = if has_pdf_extension(name) {
                name.to_string()
            } else {
                format!("{name}{EXTENSION}")
            };
            Ok(ResolvedName {
                filename,
                origin: NameOrigin::Caller,
            })
        }
        None => Ok(ResolvedName {
            filename: timestamp_name(now),
            origin: NameOrigin::Timestamp,
        }),
    }
}

/// `report.pdf` → `report_2.pdf`
pub fn with_suffix(filename: &str, n: u32) -> String {
    if has_pdf_extension(filename) {
        let stem = &filename[..filename.len() - EXTENSION.len()];
        let ext = &filename[filename.len() - EXTENSION.len()..];
        format!("{stem}_{n}{ext}")
    } else {
        format!("{filename}_{n}")
    }
}
