//! Error types for reposync-sync.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::redact::Redactor;
use crate::transport::Step;

/// Copying the source tree into a staged workspace failed.
#[derive(Debug, Error)]
pub enum StagingError {
    /// An I/O error other than "not found", with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The blocking staging task panicked or was cancelled.
    #[error("staging task did not complete: {0}")]
    Join(String),
}

/// A version-control step failed.
///
/// Every variant's text has been passed through a [`Redactor`] before it
/// leaves [`crate::Publisher::publish`].
#[derive(Debug, Error)]
pub enum PublishError {
    /// The remote URL cannot be handed to the transport.
    #[error("invalid remote URL: {0}")]
    InvalidRemote(String),

    /// The version-control program could not be started.
    #[error("could not run step `{step}`: {source}")]
    Spawn {
        step: Step,
        #[source]
        source: std::io::Error,
    },

    /// The step exited unsuccessfully.
    #[error("step `{step}` failed ({}):\n{diagnostics}", exit_label(.code))]
    Step {
        step: Step,
        code: Option<i32>,
        diagnostics: String,
    },

    /// The step exceeded the configured deadline and was killed.
    #[error("step `{step}` timed out after {}s", .after.as_secs())]
    Timeout { step: Step, after: Duration },
}

impl PublishError {
    pub fn step(&self) -> Option<Step> {
        match self {
            PublishError::InvalidRemote(_) => None,
            PublishError::Spawn { step, .. }
            | PublishError::Step { step, .. }
            | PublishError::Timeout { step, .. } => Some(*step),
        }
    }

    /// Scrub credential material out of every text field.
    pub fn redacted(self, redactor: &Redactor) -> Self {
        match self {
            PublishError::InvalidRemote(msg) => PublishError::InvalidRemote(redactor.scrub(&msg)),
            PublishError::Spawn { step, source } => PublishError::Spawn {
                step,
                source: std::io::Error::new(source.kind(), redactor.scrub(&source.to_string())),
            },
            PublishError::Step {
                step,
                code,
                diagnostics,
            } => PublishError::Step {
                step,
                code,
                diagnostics: redactor.scrub(&diagnostics),
            },
            timeout @ PublishError::Timeout { .. } => timeout,
        }
    }
}

/// Why one profile's task ended in a failed outcome.
#[derive(Debug, Error)]
pub enum ProfileSyncError {
    #[error("staging failed: {0}")]
    Staging(#[from] StagingError),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StagingError {
    StagingError::Io {
        path: path.into(),
        source,
    }
}
