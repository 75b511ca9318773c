//! Error types for repotidy modules using thiserror.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors from the autocommit flow and the repository operations behind it.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Autocommit is not initialized: no repository attached")]
    Uninitialized,

    #[error("An autocommit is already in progress for this repository")]
    InFlight,

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Failed to open repository: {0}")]
    OpenFailed(#[source] git2::Error),

    #[error("Failed to initialize repository: {0}")]
    InitFailed(String),

    #[error("Failed to read repository status: {0}")]
    StatusFailed(#[source] git2::Error),

    #[error("Failed to stage changes: {0}")]
    StagingFailed(#[source] git2::Error),

    #[error("Failed to create commit: {0}")]
    CommitFailed(#[source] git2::Error),

    #[error("Git config error (missing user.name or user.email): {0}")]
    ConfigError(#[source] git2::Error),
}

/// A single status entry that could not be turned into a change record.
///
/// These are soft: the collector skips the entry and keeps going.
#[derive(Error, Debug)]
pub enum StatusEntryError {
    #[error("Status entry has an empty path")]
    EmptyPath,

    #[error("Rename of '{0}' has no source path")]
    MissingRenameSource(String),

    #[error("Failed to read content of '{path}': {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StatusEntryError {
    /// The path the failure refers to, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            StatusEntryError::EmptyPath => None,
            StatusEntryError::MissingRenameSource(path) => Some(path),
            StatusEntryError::Unreadable { path, .. } => Some(path),
        }
    }
}

/// Why a waiter settled without a usable payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaiterError {
    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Response was empty")]
    EmptyResponse,

    #[error("Assistant transport failed: {0}")]
    Transport(String),

    #[error("Request was cancelled")]
    Cancelled,
}

/// Errors from the external assistant CLI.
#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("Assistant command '{0}' not found in PATH")]
    NotInstalled(String),

    #[error("Assistant command is empty")]
    EmptyCommand,

    #[error("Failed to spawn assistant process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Assistant exited with code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },

    #[error("Assistant reported an error: {0}")]
    Reported(String),

    #[error("Failed to send assistant request: {0}")]
    SendFailed(String),
}

/// Errors from the file size monitor.
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to watch {path}: {source}")]
    WatchFailed {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {reason}")]
    InvalidToml { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}' in {path}: {reason}")]
    InvalidValue {
        path: PathBuf,
        key: String,
        reason: String,
    },
}
