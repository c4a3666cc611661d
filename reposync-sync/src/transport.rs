//! Repository transport: the version-control capabilities a publish needs.
//!
//! [`GitCli`] shells out to the `git` binary with `tokio::process::Command`.
//! Every child runs inside the staged directory with a fixed committer
//! identity supplied through the environment, so neither global nor user
//! git config is consulted for identity or modified.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use reposync_core::CommitterIdentity;

use crate::error::PublishError;
use crate::redact::AuthenticatedRemote;

/// One version-control subprocess step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Init,
    CheckoutOrphan,
    StageAll,
    Commit,
    DeleteBranch,
    RenameBranch,
    ForcePush,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Init => "init",
            Step::CheckoutOrphan => "checkout-orphan",
            Step::StageAll => "add",
            Step::Commit => "commit",
            Step::DeleteBranch => "delete-branch",
            Step::RenameBranch => "rename-branch",
            Step::ForcePush => "force-push",
        };
        f.write_str(name)
    }
}

/// Captured output of a successful step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutput {
    pub step: Step,
    pub stdout: String,
    pub stderr: String,
}

impl StepOutput {
    pub fn empty(step: Step) -> Self {
        Self {
            step,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

/// Capabilities the publisher drives, in order: `init`, `commit_all`,
/// `rename_branch`, `force_push`.
#[async_trait]
pub trait RepositoryTransport: Send + Sync {
    /// Create a fresh repository in `dir` and switch to an orphan `branch`.
    async fn init(&self, dir: &Path, branch: &str) -> Result<StepOutput, PublishError>;

    /// Record every file in `dir` as one commit. Must succeed for an empty tree.
    async fn commit_all(&self, dir: &Path, message: &str) -> Result<StepOutput, PublishError>;

    /// Rename `from` to `to`, deleting an existing local `to` first.
    async fn rename_branch(&self, dir: &Path, from: &str, to: &str)
        -> Result<StepOutput, PublishError>;

    /// Overwrite `branch` on the remote with the local `branch`.
    async fn force_push(
        &self,
        dir: &Path,
        remote: &AuthenticatedRemote,
        branch: &str,
    ) -> Result<StepOutput, PublishError>;
}

// ---------------------------------------------------------------------------
// git CLI
// ---------------------------------------------------------------------------

/// Remote name defined only in the push child's environment.
const PUSH_REMOTE: &str = "reposync-mirror";

/// [`RepositoryTransport`] backed by the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: OsString,
    identity: CommitterIdentity,
    step_timeout: Option<Duration>,
}

impl GitCli {
    pub fn new(identity: CommitterIdentity) -> Self {
        Self {
            program: OsString::from("git"),
            identity,
            step_timeout: None,
        }
    }

    /// Use a different executable (an absolute path to a pinned git).
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Kill and fail any step still running after `timeout`.
    pub fn with_step_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.step_timeout = timeout;
        self
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .env("GIT_AUTHOR_NAME", &self.identity.name)
            .env("GIT_AUTHOR_EMAIL", &self.identity.email)
            .env("GIT_COMMITTER_NAME", &self.identity.name)
            .env("GIT_COMMITTER_EMAIL", &self.identity.email)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Run one step; a non-zero exit becomes [`PublishError::Step`].
    async fn run(&self, step: Step, dir: &Path, args: &[&str]) -> Result<StepOutput, PublishError> {
        self.run_with_env(step, dir, args, &[]).await
    }

    async fn run_with_env(
        &self,
        step: Step,
        dir: &Path,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<StepOutput, PublishError> {
        let (code, output) = self.spawn(step, dir, args, envs).await?;
        if code == Some(0) {
            return Ok(output);
        }
        let diagnostics = if output.stderr.trim().is_empty() {
            output.stdout.trim().to_string()
        } else {
            output.stderr.trim().to_string()
        };
        Err(PublishError::Step {
            step,
            code,
            diagnostics,
        })
    }

    /// Run one step and return its exit code without judging it.
    async fn spawn(
        &self,
        step: Step,
        dir: &Path,
        args: &[&str],
        envs: &[(&str, &str)],
    ) -> Result<(Option<i32>, StepOutput), PublishError> {
        tracing::debug!(%step, dir = %dir.display(), "running git step");
        let mut cmd = self.command(dir);
        cmd.args(args).envs(envs.iter().copied());
        let child = cmd.output();
        let output = match self.step_timeout {
            Some(after) => tokio::time::timeout(after, child)
                .await
                .map_err(|_| PublishError::Timeout { step, after })?,
            None => child.await,
        }
        .map_err(|source| PublishError::Spawn { step, source })?;

        Ok((
            output.status.code(),
            StepOutput {
                step,
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
        ))
    }
}

#[async_trait]
impl RepositoryTransport for GitCli {
    async fn init(&self, dir: &Path, branch: &str) -> Result<StepOutput, PublishError> {
        self.run(Step::Init, dir, &["init", "--quiet"]).await?;
        self.run(Step::CheckoutOrphan, dir, &["checkout", "--quiet", "--orphan", branch])
            .await
    }

    async fn commit_all(&self, dir: &Path, message: &str) -> Result<StepOutput, PublishError> {
        self.run(Step::StageAll, dir, &["add", "--all"]).await?;
        self.run(
            Step::Commit,
            dir,
            &[
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--quiet",
                "--no-verify",
                "--allow-empty",
                "-m",
                message,
            ],
        )
        .await
    }

    async fn rename_branch(
        &self,
        dir: &Path,
        from: &str,
        to: &str,
    ) -> Result<StepOutput, PublishError> {
        if from == to {
            return Ok(StepOutput::empty(Step::RenameBranch));
        }
        // `show-ref` exits 1 when the branch does not exist; that is not an error here.
        let to_ref = format!("refs/heads/{to}");
        let (exists, _) = self
            .spawn(Step::DeleteBranch, dir, &["show-ref", "--verify", "--quiet", &to_ref], &[])
            .await?;
        if exists == Some(0) {
            self.run(Step::DeleteBranch, dir, &["branch", "-D", to]).await?;
        }
        self.run(Step::RenameBranch, dir, &["branch", "-m", from, to])
            .await
    }

    async fn force_push(
        &self,
        dir: &Path,
        remote: &AuthenticatedRemote,
        branch: &str,
    ) -> Result<StepOutput, PublishError> {
        let refspec = format!("{branch}:refs/heads/{branch}");
        // The credential-bearing URL reaches git through its environment
        // config, never argv, so it does not show up in process listings.
        // It names a remote that exists only for this child process.
        // An empty credential.helper keeps helpers from caching the embedded token.
        let url_key = format!("remote.{PUSH_REMOTE}.url");
        self.run_with_env(
            Step::ForcePush,
            dir,
            &[
                "-c",
                "credential.helper=",
                "push",
                "--force",
                "--no-verify",
                "--porcelain",
                PUSH_REMOTE,
                &refspec,
            ],
            &[
                ("GIT_CONFIG_COUNT", "1"),
                ("GIT_CONFIG_KEY_0", &url_key),
                ("GIT_CONFIG_VALUE_0", remote.expose_url()),
            ],
        )
        .await
    }
}
