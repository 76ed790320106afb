//! Error types for the testredundancy library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using testredundancy's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while collecting coverage or selecting tests.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A coverage line that does not follow the profile grammar.
    #[error("Malformed coverage record {line:?}: {reason}")]
    MalformedRecord { line: String, reason: String },

    /// The test runner failed or produced unusable output for one test.
    #[error("Test run failed for {test}: {reason}")]
    TestRunFailure { test: String, reason: String },

    /// Every candidate test failed to run.
    #[error("No usable coverage data: no tests ran successfully")]
    NoUsableCoverage,

    /// The operation was cancelled before it completed.
    #[error("Operation cancelled")]
    Cancelled,

    /// A pipeline stage (package listing, test discovery, ...) failed.
    #[error("{stage} failed: {message}")]
    Discovery { stage: String, message: String },

    /// Parse error from tree-sitter.
    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Create a malformed record error.
    pub fn malformed(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Create a test run failure.
    pub fn test_run(test: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TestRunFailure {
            test: test.into(),
            reason: reason.into(),
        }
    }

    /// Create a stage failure.
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Discovery {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error is recoverable per test (skip and continue).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MalformedRecord { .. } | Self::TestRunFailure { .. }
        )
    }
}
