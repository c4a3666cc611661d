//! Error types for reposync-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::SyncReport;

/// Errors raised while loading or saving settings and profiles, or unlocking
/// the settings gate.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No stored profile matches the given name or id.
    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    /// A stored profile already uses this name.
    #[error("a profile named '{0}' already exists")]
    DuplicateProfile(String),

    /// A profile field failed validation.
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// The stored settings password digest is not 64 hex characters.
    #[error("settings password digest is not a valid SHA-256 hex string")]
    InvalidPasswordDigest,

    /// The supplied settings password was missing or wrong.
    #[error("access denied: settings are locked")]
    Locked,
}

/// Raised synchronously before any sync task starts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidInputError {
    #[error("no sync profiles were provided")]
    NoProfiles,
}

/// One or more profile syncs failed. Successful outcomes are kept in `report`.
#[derive(Debug, Error)]
#[error("{failed} of {attempted} profile syncs failed")]
pub struct AggregateFailure {
    pub attempted: usize,
    pub failed: usize,
    pub report: SyncReport,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}
