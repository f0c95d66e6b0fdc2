//! Error types for moodle-stack.
//!
//! Every variant is terminal for the current invocation: drivers never retry
//! and `main` turns the error into one diagnostic line plus an exit status.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from validating the loaded environment into a `MoodleConfig`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Required configuration missing: {key}")]
    MissingKey { key: &'static str },

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum StackError {
    #[error("Configuration file not found: {}", path.display())]
    ConfigurationMissing { path: PathBuf },

    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    #[error("Failed to parse {}: {message}", path.display())]
    ConfigurationUnreadable { path: PathBuf, message: String },

    #[error("Required tool not found on PATH: {tool}")]
    DependencyMissing { tool: String },

    #[error("Failed to pull image {image}: {detail}")]
    ImageFetchFailed {
        image: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("Failed to tear down the running stack: {detail}")]
    TeardownFailed { code: Option<i32>, detail: String },

    #[error("Failed to start the stack: {detail}")]
    TopologyStartFailed { code: Option<i32>, detail: String },

    #[error("Failed to clear database storage at {}: {source}", path.display())]
    StorageResetFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup failed: {detail}")]
    BackupCopyFailed { detail: String },

    #[error("Reset aborted: confirmation required (pass --yes to skip the prompt)")]
    ResetNotConfirmed,

    #[error("Another moodle-stack command holds the lock at {}", path.display())]
    Busy { path: PathBuf },

    #[error("Failed to query stack status: {detail}")]
    StatusFailed { detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StackError {
    /// Process exit status for this error. Failures reported by the external
    /// tooling keep that tool's own status.
    pub fn exit_code(&self) -> i32 {
        match self {
            StackError::ImageFetchFailed { code, .. }
            | StackError::TeardownFailed { code, .. }
            | StackError::TopologyStartFailed { code, .. } => match code {
                Some(c) if *c != 0 => *c,
                _ => 1,
            },
            _ => 1,
        }
    }

    /// The single line printed on stderr when a command fails.
    pub fn diagnostic(&self) -> String {
        format!("error: {self}")
    }
}

pub type Result<T> = std::result::Result<T, StackError>;
