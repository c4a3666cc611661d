//! `reposync sync`: stage the project tree and force-push it to each profile.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use reposync_core::{profiles, settings, SettingsGate, SyncProfile, SyncReport};
use reposync_sync::Orchestrator;

use super::home_dir;

/// Arguments for `reposync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Profile name or id to sync; repeatable. Omit to sync every profile.
    #[arg(long = "profile", short = 'p', value_name = "NAME")]
    pub profiles: Vec<String>,

    /// Project tree to mirror. Overrides the configured root.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Settings password, when one is configured.
    #[arg(long, env = "REPOSYNC_SETTINGS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let settings = settings::load_at(&home).context("failed to load settings")?;
        let grant = SettingsGate::from_settings(&settings)
            .context("invalid settings file")?
            .unlock(self.password.as_deref())
            .context("settings are password protected; pass --password")?;

        let store = profiles::load_at(&home).context("failed to load profiles")?;
        let selected: Vec<SyncProfile> = store
            .select(&self.profiles)
            .context("unknown profile")?
            .into_iter()
            .map(|record| record.to_sync_profile())
            .collect();

        let root = match self.root {
            Some(root) => root,
            None => {
                let cwd = std::env::current_dir().context("cannot read current directory")?;
                settings.resolve_project_root(&cwd)
            }
        };

        let orchestrator = Orchestrator::from_settings(&settings, &root);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        let report = runtime
            .block_on(orchestrator.sync_all(&grant, selected))
            .context("nothing to sync; add one with `reposync profile add`")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }

        report.into_result()?;
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let header = format!(
        "Sync finished. Succeeded: {}. Failed: {}.",
        report.succeeded, report.failed
    );
    if report.is_success() {
        println!("{}", header.green().bold());
    } else {
        println!("{}", header.red().bold());
    }
    println!();
    for outcome in &report.outcomes {
        let line = outcome.report_line();
        if outcome.succeeded {
            println!("{}", line.green());
        } else {
            println!("{}", line.red());
        }
    }
}
