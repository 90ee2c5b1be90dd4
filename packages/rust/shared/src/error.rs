//! Error types for Bellgrid.
//!
//! Library crates use [`BellgridError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all Bellgrid operations.
#[derive(Debug, thiserror::Error)]
pub enum BellgridError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching the schedule page or a document.
    #[error("network error: {0}")]
    Network(String),

    /// PDF could not be opened or its text could not be extracted.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Document name or schedule text could not be interpreted.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad mode name, oversized document, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BellgridError>;

impl BellgridError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BellgridError::config("academic_year_start must be positive");
        assert_eq!(
            err.to_string(),
            "config error: academic_year_start must be positive"
        );

        let err = BellgridError::parse("no month in 'Week 12'");
        assert!(err.to_string().contains("Week 12"));

        let err = BellgridError::Extraction("not a PDF".into());
        assert_eq!(err.to_string(), "extraction error: not a PDF");
    }

    #[test]
    fn io_error_carries_path() {
        let err = BellgridError::io(
            "/tmp/missing.pdf",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        let msg = err.to_string();
        assert!(msg.contains("missing.pdf"));
        assert!(msg.contains("gone"));
    }
}
