//! Settings file: `<home>/.reposync/config.yaml`.
//!
//! Every function has two forms, following the profile store:
//! - `fn_at(home: &Path, …)`: explicit home, used by tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()` and delegates to `_at`
//!
//! A missing file loads as [`Settings::default`]; unknown keys are rejected so
//! typos surface as parse errors instead of silently falling back.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SettingsError};
use crate::fs_atomic;

/// Directory under `$HOME` holding settings and profiles.
pub const SETTINGS_DIR: &str = ".reposync";
pub const SETTINGS_FILE: &str = "config.yaml";

/// Directory names pruned from every staged snapshot.
pub const DEFAULT_EXCLUDES: &[&str] = &[".git", "node_modules", ".next", "target", "logs", "backups"];

/// Upper bound on a single retry backoff.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Project tree to mirror. `None` means the current working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_root: Option<PathBuf>,
    /// Scratch directory name, created inside the project root. Never staged.
    pub scratch_dir: String,
    /// File or directory names excluded at any depth.
    pub exclude: BTreeSet<String>,
    pub committer: CommitterIdentity,
    /// Branch force-pushed on every remote.
    pub default_branch: String,
    pub commit_message_prefix: String,
    pub push: PushPolicy,
    /// SHA-256 hex digest of the settings password. `None` leaves the gate open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_password_sha256: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project_root: None,
            scratch_dir: ".reposync-tmp".to_string(),
            exclude: DEFAULT_EXCLUDES.iter().map(|s| (*s).to_string()).collect(),
            committer: CommitterIdentity::default(),
            default_branch: "main".to_string(),
            commit_message_prefix: "Full mirror replace".to_string(),
            push: PushPolicy::default(),
            settings_password_sha256: None,
        }
    }
}

impl Settings {
    /// Project root to stage: the configured one, else `fallback`.
    pub fn resolve_project_root(&self, fallback: &Path) -> PathBuf {
        self.project_root
            .clone()
            .unwrap_or_else(|| fallback.to_path_buf())
    }

    /// `<project_root>/<scratch_dir>`
    pub fn scratch_root(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.scratch_dir)
    }
}

/// Author and committer identity used for mirror commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommitterIdentity {
    pub name: String,
    pub email: String,
}

impl Default for CommitterIdentity {
    fn default() -> Self {
        Self {
            name: "Repo Sync".to_string(),
            email: "sync@reposync.local".to_string(),
        }
    }
}

/// Retry and timeout policy for publishing.
///
/// The defaults (no retries, no timeout) let every step run to completion or
/// natural failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PushPolicy {
    /// Extra attempts for the force-push step after a failure.
    pub retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_ms: u64,
    /// Deadline applied to every subprocess step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
}

impl PushPolicy {
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    /// Backoff before retry number `retry` (1-based), capped at one minute.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.reposync/`
pub fn settings_dir_at(home: &Path) -> PathBuf {
    home.join(SETTINGS_DIR)
}

/// `<home>/.reposync/config.yaml`
pub fn settings_path_at(home: &Path) -> PathBuf {
    settings_dir_at(home).join(SETTINGS_FILE)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load settings, returning defaults when the file does not exist.
pub fn load_at(home: &Path) -> Result<Settings, SettingsError> {
    let path = settings_path_at(home);
    if !path.exists() {
        return Ok(Settings::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, SettingsError> {
    load_at(&home()?)
}

/// Atomically save settings (mode `0600`).
pub fn save_at(home: &Path, settings: &Settings) -> Result<(), SettingsError> {
    let yaml = serde_yaml::to_string(settings)?;
    fs_atomic::write_private(&settings_path_at(home), &yaml)
}

/// `save_at` convenience wrapper.
pub fn save(settings: &Settings) -> Result<(), SettingsError> {
    save_at(&home()?, settings)
}

pub(crate) fn home() -> Result<PathBuf, SettingsError> {
    dirs::home_dir().ok_or(SettingsError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let home = TempDir::new().unwrap();
        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(settings.exclude.contains("node_modules"));
        assert!(settings.exclude.contains(".git"));
        assert_eq!(settings.default_branch, "main");
    }

    #[test]
    fn save_and_load_roundtrip() {
        let home = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.project_root = Some(PathBuf::from("/srv/scraper"));
        settings.exclude.insert("dist".to_string());
        settings.push.retries = 2;
        settings.push.step_timeout_secs = Some(90);

        save_at(home.path(), &settings).unwrap();
        assert_eq!(load_at(home.path()).unwrap(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let home = TempDir::new().unwrap();
        let path = settings_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "default_branch: trunk\npush:\n  retries: 3\n").unwrap();

        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings.default_branch, "trunk");
        assert_eq!(settings.push.retries, 3);
        assert_eq!(settings.push.backoff_ms, 0);
        assert_eq!(settings.scratch_dir, ".reposync-tmp");
    }

    #[test]
    fn unknown_key_is_a_parse_error_with_path() {
        let home = TempDir::new().unwrap();
        let path = settings_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "defualt_branch: main\n").unwrap();

        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = PushPolicy {
            retries: 5,
            backoff_ms: 500,
            step_timeout_secs: None,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(200), MAX_BACKOFF);
    }

    #[test]
    fn scratch_root_is_inside_project_root() {
        let settings = Settings::default();
        let root = Path::new("/srv/app");
        assert_eq!(settings.scratch_root(root), PathBuf::from("/srv/app/.reposync-tmp"));
        assert_eq!(settings.resolve_project_root(root), PathBuf::from("/srv/app"));
    }
}
