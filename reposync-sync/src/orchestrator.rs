//! Sync orchestrator: one concurrent stage + publish task per profile.
//!
//! Each task owns its staged workspace and child processes; nothing mutable is
//! shared between tasks. Results are collected in input order, and a failing
//! or panicking task only affects its own outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::Instrument;

use reposync_core::{InvalidInputError, Settings, SettingsUnlocked, SyncOutcome, SyncProfile, SyncReport};

use crate::error::ProfileSyncError;
use crate::publisher::{PublishOptions, PublishOutput, Publisher};
use crate::stager::{stage_async, StageOptions};
use crate::transport::{GitCli, RepositoryTransport};

/// Fans a list of profiles out to concurrent sync tasks.
#[derive(Debug)]
pub struct Orchestrator<T> {
    project_root: PathBuf,
    stage: StageOptions,
    publisher: Arc<Publisher<T>>,
}

impl Orchestrator<GitCli> {
    /// Orchestrator driving the `git` executable, configured from `settings`.
    pub fn from_settings(settings: &Settings, project_root: &Path) -> Self {
        let transport = GitCli::new(settings.committer.clone())
            .with_step_timeout(settings.push.step_timeout());
        Self::new(
            project_root,
            StageOptions::from_settings(settings, project_root),
            Publisher::new(transport, PublishOptions::from_settings(settings)),
        )
    }
}

impl<T: RepositoryTransport + 'static> Orchestrator<T> {
    pub fn new(project_root: impl Into<PathBuf>, stage: StageOptions, publisher: Publisher<T>) -> Self {
        Self {
            project_root: project_root.into(),
            stage,
            publisher: Arc::new(publisher),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Mirror the project tree to every profile concurrently.
    ///
    /// Returns one outcome per profile in input order. Individual failures
    /// are reported inside the [`SyncReport`]; the only error is an empty
    /// profile list, rejected before any work starts.
    pub async fn sync_all(
        &self,
        _grant: &SettingsUnlocked,
        profiles: Vec<SyncProfile>,
    ) -> Result<SyncReport, InvalidInputError> {
        if profiles.is_empty() {
            return Err(InvalidInputError::NoProfiles);
        }
        tracing::info!(
            profiles = profiles.len(),
            root = %self.project_root.display(),
            "starting mirror sync"
        );

        let tasks = profiles.into_iter().map(|profile| {
            let source_root = self.project_root.clone();
            let stage = self.stage.clone();
            let publisher = Arc::clone(&self.publisher);
            let fallback = profile.clone();
            let started = Instant::now();

            let span = tracing::info_span!(
                "profile",
                remote = %profile.identity(),
                name = profile.name.as_deref().unwrap_or("-"),
            );
            let handle = tokio::spawn(
                run_profile(source_root, stage, publisher, profile).instrument(span),
            );

            async move {
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        tracing::warn!(remote = %fallback.identity(), error = %err, "sync task aborted");
                        SyncOutcome::failure(
                            &fallback,
                            format!("sync task did not complete: {err}"),
                            started.elapsed(),
                        )
                    }
                }
            }
        });

        let outcomes = join_all(tasks).await;
        let report = SyncReport::from_outcomes(outcomes);
        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "mirror sync finished"
        );
        Ok(report)
    }
}

async fn run_profile<T: RepositoryTransport>(
    source_root: PathBuf,
    stage: StageOptions,
    publisher: Arc<Publisher<T>>,
    profile: SyncProfile,
) -> SyncOutcome {
    let started = Instant::now();
    match stage_and_publish(source_root, stage, &publisher, &profile).await {
        Ok(output) => {
            tracing::info!(
                state = "succeeded",
                attempts = output.attempts,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "profile synced"
            );
            SyncOutcome::success(&profile, output.detail(), started.elapsed())
        }
        Err(err) => {
            tracing::warn!(state = "failed", error = %err, "profile sync failed");
            SyncOutcome::failure(&profile, err.to_string(), started.elapsed())
        }
    }
}

async fn stage_and_publish<T: RepositoryTransport>(
    source_root: PathBuf,
    stage: StageOptions,
    publisher: &Publisher<T>,
    profile: &SyncProfile,
) -> Result<PublishOutput, ProfileSyncError> {
    tracing::info!(state = "staging", "staging workspace");
    let workspace = stage_async(source_root, stage).await?;
    let stats = workspace.stats();
    tracing::info!(
        state = "publishing",
        files = stats.files,
        dirs = stats.dirs,
        skipped = stats.special,
        "publishing snapshot"
    );

    let published = publisher
        .publish(&workspace, &profile.repository_url, &profile.credential)
        .await;

    // Removal is also guaranteed by Drop; closing here surfaces the error.
    if let Err(err) = workspace.close_async().await {
        tracing::warn!(error = %err, "could not remove staged workspace");
    }
    Ok(published?)
}
