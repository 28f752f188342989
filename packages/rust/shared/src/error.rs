//! Error types for Bibliothek.
//!
//! Library crates use [`BibliothekError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all build-registration operations.
#[derive(Debug, thiserror::Error)]
pub enum BibliothekError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// An artifact locator resolved to zero or several files.
    #[error("artifact pattern '{pattern}' matched {} files, expected exactly 1: {matches:?}", .matches.len())]
    AmbiguousArtifact {
        pattern: String,
        matches: Vec<PathBuf>,
    },

    /// The blob store answered an upload with a non-success status.
    #[error("upload to {target} failed, server returned {status}: {body}")]
    Upload {
        target: String,
        status: u16,
        body: String,
    },

    /// Transport-level HTTP failure (connect, TLS, body read).
    #[error("network error: {0}")]
    Network(String),

    /// Catalog connection or query failure.
    #[error("catalog error: {0}")]
    Catalog(String),

    /// The requested commit range could not be resolved or walked.
    #[error("changelog range '{range}' could not be read: {message}")]
    ChangelogRange { range: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (malformed stored record, invalid key, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BibliothekError>;

impl BibliothekError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a changelog range error.
    pub fn changelog_range(range: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::ChangelogRange {
            range: range.into(),
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
        let err = BibliothekError::config("projectName is required");
        assert_eq!(err.to_string(), "config error: projectName is required");

        let err = BibliothekError::Upload {
            target: "foo/1.0/5/foo-1.0-5.jar".into(),
            status: 403,
            body: "forbidden".into(),
        };
        assert!(err.to_string().contains("403"));
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn ambiguous_artifact_reports_count() {
        let err = BibliothekError::AmbiguousArtifact {
            pattern: "build/libs/*.jar".into(),
            matches: vec!["a.jar".into(), "b.jar".into()],
        };
        assert!(err.to_string().contains("matched 2 files"));
    }
}
