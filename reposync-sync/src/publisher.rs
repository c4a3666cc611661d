//! Mirror publisher: staged directory → one orphan commit → force push.
//!
//! ## `publish`: 7-step protocol
//!
//! 1. Initialize a fresh repository in the staged directory.
//! 2. Committer identity comes from the transport (never global config).
//! 3. Build the authenticated remote URL in memory.
//! 4. Switch to an orphan working branch (zero ancestors).
//! 5. Stage and commit everything, empty trees included.
//! 6. Rename the working branch to the default branch.
//! 7. Force-push the default branch, overwriting remote history.
//!
//! The first failing step aborts the publish. Errors and captured output are
//! scrubbed by a [`Redactor`] before they leave this module.

use chrono::{SecondsFormat, Utc};

use reposync_core::{Credential, PushPolicy, Settings};

use crate::error::PublishError;
use crate::redact::{AuthenticatedRemote, Redactor};
use crate::stager::StagedWorkspace;
use crate::transport::{RepositoryTransport, StepOutput};

/// Local branch the snapshot is committed on before the rename.
pub const ORPHAN_BRANCH: &str = "reposync-orphan";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    pub default_branch: String,
    pub commit_message_prefix: String,
    pub policy: PushPolicy,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PublishOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_branch: settings.default_branch.clone(),
            commit_message_prefix: settings.commit_message_prefix.clone(),
            policy: settings.push.clone(),
        }
    }
}

/// Redacted diagnostics of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutput {
    pub remote: String,
    pub branch: String,
    pub commit_message: String,
    /// Push attempts made, 1 when the first push succeeded.
    pub attempts: u32,
    pub stdout: String,
    pub stderr: String,
}

impl PublishOutput {
    /// Detail text recorded in a successful outcome.
    pub fn detail(&self) -> String {
        format!(
            "Repository {} fully replaced on branch {}.\nstdout: {}\nstderr: {}",
            self.remote,
            self.branch,
            self.stdout.trim(),
            self.stderr.trim()
        )
    }
}

/// Drives a [`RepositoryTransport`] through the publish protocol.
#[derive(Debug)]
pub struct Publisher<T> {
    transport: T,
    options: PublishOptions,
}

impl<T: RepositoryTransport> Publisher<T> {
    pub fn new(transport: T, options: PublishOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Replace the remote's default branch with the contents of `workspace`.
    ///
    /// Destructive and not idempotent in history terms: every call creates a
    /// new root commit and overwrites whatever the remote branch held.
    pub async fn publish(
        &self,
        workspace: &StagedWorkspace,
        remote_url: &str,
        credential: &Credential,
    ) -> Result<PublishOutput, PublishError> {
        let remote = AuthenticatedRemote::new(remote_url, credential)?;
        let redactor = Redactor::new(credential, &remote);

        match self.run_steps(workspace, &remote, &redactor).await {
            Ok(output) => Ok(output),
            Err(err) => Err(err.redacted(&redactor)),
        }
    }

    async fn run_steps(
        &self,
        workspace: &StagedWorkspace,
        remote: &AuthenticatedRemote,
        redactor: &Redactor,
    ) -> Result<PublishOutput, PublishError> {
        let dir = workspace.path();
        let branch = self.options.default_branch.as_str();

        self.transport.init(dir, ORPHAN_BRANCH).await?;

        let commit_message = format!(
            "{}: {}",
            self.options.commit_message_prefix,
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        self.transport.commit_all(dir, &commit_message).await?;
        self.transport
            .rename_branch(dir, ORPHAN_BRANCH, branch)
            .await?;

        let (pushed, attempts) = self.push_with_retries(workspace, remote, redactor).await?;

        Ok(PublishOutput {
            remote: remote.display().to_string(),
            branch: branch.to_string(),
            commit_message,
            attempts,
            stdout: redactor.scrub(&pushed.stdout),
            stderr: redactor.scrub(&pushed.stderr),
        })
    }

    async fn push_with_retries(
        &self,
        workspace: &StagedWorkspace,
        remote: &AuthenticatedRemote,
        redactor: &Redactor,
    ) -> Result<(StepOutput, u32), PublishError> {
        let policy = &self.options.policy;
        let branch = self.options.default_branch.as_str();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self
                .transport
                .force_push(workspace.path(), remote, branch)
                .await
            {
                Ok(output) => return Ok((output, attempt)),
                Err(err) if attempt <= policy.retries => {
                    let delay = policy.backoff_for(attempt);
                    tracing::warn!(
                        remote = %remote.display(),
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %redactor.scrub(&err.to_string()),
                        "force push failed; retrying",
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
