// src/error.rs

//! Unified error handling for the aggregation application.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Result type alias for tally operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Delimited text reading or writing failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Archive could not be read or extracted
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Regular expression failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A blocking task panicked or was aborted
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A step could not start (bad directory, bad base URL, ...)
    #[error("Setup error: {0}")]
    Setup(String),

    /// A single transfer failed
    #[error("Fetch error for {context}: {message}")]
    Fetch { context: String, message: String },

    /// An operation exceeded its time budget
    #[error("Timed out after {secs:.1}s: {context}")]
    Timeout { context: String, secs: f64 },

    /// Persisted checkpoint could not be read back
    #[error("Corrupt checkpoint {path}: {message}")]
    Checkpoint { path: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a setup error.
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup(message.into())
    }

    /// Create a fetch error with context.
    pub fn fetch(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(context: impl Into<String>, limit: std::time::Duration) -> Self {
        Self::Timeout {
            context: context.into(),
            secs: limit.as_secs_f64(),
        }
    }

    /// Create a checkpoint corruption error.
    pub fn checkpoint(path: &Path, message: impl fmt::Display) -> Self {
        Self::Checkpoint {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error means persisted state is unreadable rather than unreachable.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Checkpoint { .. } | Self::Json(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_message() {
        let err = AppError::timeout("download 20130401.export.CSV.zip", Duration::from_secs(10));
        assert_eq!(
            err.to_string(),
            "Timed out after 10.0s: download 20130401.export.CSV.zip"
        );
    }

    #[test]
    fn test_corruption_classification() {
        let err = AppError::checkpoint(Path::new("manifest.json"), "missing artifact");
        assert!(err.is_corruption());
        assert!(!AppError::setup("bad dir").is_corruption());
    }
}
