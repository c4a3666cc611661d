//! `reposync init [--root <dir>] [--settings-password <pw>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use reposync_core::{auth::hash_password, settings, SettingsGate};

use super::home_dir;

/// Create or update the settings file.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Project tree to mirror. Defaults to the working directory at sync time.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// New settings password; required later by `reposync sync`.
    #[arg(long, value_name = "PW")]
    pub settings_password: Option<String>,

    /// Current settings password, when one is already configured.
    #[arg(long, env = "REPOSYNC_SETTINGS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let mut current = settings::load_at(&home).context("failed to load settings")?;

        SettingsGate::from_settings(&current)
            .context("invalid settings file")?
            .unlock(self.password.as_deref())
            .context("settings are password protected; pass the current one with --password")?;

        if let Some(root) = &self.root {
            let root = root
                .canonicalize()
                .with_context(|| format!("cannot resolve path '{}'", root.display()))?;
            current.project_root = Some(root);
        }
        if let Some(pw) = self.settings_password.as_deref() {
            anyhow::ensure!(!pw.is_empty(), "settings password must not be empty");
            current.settings_password_sha256 = Some(hash_password(pw));
        }

        settings::save_at(&home, &current).context("failed to save settings")?;

        println!("✓ Settings saved to {}", settings::settings_path_at(&home).display());
        match &current.project_root {
            Some(root) => println!("  Project root: {}", root.display()),
            None => println!("  Project root: current directory"),
        }
        if current.settings_password_sha256.is_some() {
            println!("  Settings password: set");
        }
        Ok(())
    }
}
