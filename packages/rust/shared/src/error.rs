//! Error types for refconv.
//!
//! Library crates use [`RefConvError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all refconv operations.
#[derive(Debug, thiserror::Error)]
pub enum RefConvError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while downloading the archive or the feed.
    #[error("network error: {0}")]
    Network(String),

    /// The documentation archive could not be unpacked.
    #[error("archive error: {message}")]
    Archive { message: String },

    /// The revision feed could not be read.
    #[error("feed error: {message}")]
    Feed { message: String },

    /// A source document is structurally broken. Aborts the whole run.
    #[error("failed to convert {path}: {message}")]
    Document { path: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad source location, bad settings, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Catalog encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, RefConvError>;

impl RefConvError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an archive error from any displayable message.
    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive {
            message: msg.into(),
        }
    }

    /// Create a feed error from any displayable message.
    pub fn feed(msg: impl Into<String>) -> Self {
        Self::Feed {
            message: msg.into(),
        }
    }

    /// Create a document error naming the offending source path.
    pub fn document(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Document {
            path: path.into(),
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
        let err = RefConvError::config("missing base_url");
        assert_eq!(err.to_string(), "config error: missing base_url");

        let err = RefConvError::validation("invalid source, must be a tar.gz");
        assert!(err.to_string().contains("tar.gz"));
    }

    #[test]
    fn document_error_names_the_path() {
        let err = RefConvError::document(
            "xml/en/docs/http/ngx_http_core_module.xml",
            "unexpected </para>, wanted </list>",
        );
        let msg = err.to_string();
        assert!(msg.starts_with("failed to convert xml/en/docs/http/ngx_http_core_module.xml"));
        assert!(msg.ends_with("wanted </list>"));
    }
}
