//! Persisted sync profiles.
//!
//! # Storage layout
//!
//! ```text
//! ~/.reposync/
//!   config.yaml     (settings)
//!   profiles.yaml   (this store, mode 0600; holds access tokens)
//! ```
//!
//! The orchestrator never reads this file. Callers load records here and
//! hand [`SyncProfile`]s to it per invocation.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, SettingsError};
use crate::fs_atomic;
use crate::settings::{home, settings_dir_at};
use crate::types::{Credential, ProfileId, SyncProfile};

pub const PROFILES_FILE: &str = "profiles.yaml";
const STORE_VERSION: u32 = 1;

/// One stored destination.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: ProfileId,
    pub name: String,
    pub repository_url: String,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for ProfileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("repository_url", &self.repository_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl ProfileRecord {
    pub fn to_sync_profile(&self) -> SyncProfile {
        SyncProfile::new(&self.repository_url, Credential::new(self.token.clone()))
            .with_name(&self.name)
    }

    fn matches(&self, key: &str) -> bool {
        self.id.0 == key || self.name == key
    }
}

/// Root of `profiles.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStore {
    pub version: u32,
    #[serde(default)]
    pub profiles: Vec<ProfileRecord>,
}

impl Default for ProfileStore {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            profiles: vec![],
        }
    }
}

impl ProfileStore {
    pub fn find(&self, key: &str) -> Option<&ProfileRecord> {
        self.profiles.iter().find(|p| p.matches(key))
    }

    /// Profiles selected by name or id, in the order requested.
    ///
    /// An empty `keys` selects every stored profile in store order.
    pub fn select(&self, keys: &[String]) -> Result<Vec<&ProfileRecord>, SettingsError> {
        if keys.is_empty() {
            return Ok(self.profiles.iter().collect());
        }
        keys.iter()
            .map(|key| {
                self.find(key)
                    .ok_or_else(|| SettingsError::ProfileNotFound(key.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.reposync/profiles.yaml`
pub fn profiles_path_at(home: &Path) -> PathBuf {
    settings_dir_at(home).join(PROFILES_FILE)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load the store, returning an empty one when the file does not exist.
pub fn load_at(home: &Path) -> Result<ProfileStore, SettingsError> {
    let path = profiles_path_at(home);
    if !path.exists() {
        return Ok(ProfileStore::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse { path, source })
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ProfileStore, SettingsError> {
    load_at(&home()?)
}

/// Atomically save the store.
///
/// Write flow: serialize → `profiles.yaml.tmp` → `chmod 0600` → `rename`.
pub fn save_at(home: &Path, store: &ProfileStore) -> Result<(), SettingsError> {
    let yaml = serde_yaml::to_string(store)?;
    fs_atomic::write_private(&profiles_path_at(home), &yaml)
}

// ---------------------------------------------------------------------------
// Add / remove
// ---------------------------------------------------------------------------

/// Add a profile and persist the store.
///
/// Names are unique; an empty name, URL or token is rejected.
pub fn add_at(
    home: &Path,
    name: &str,
    repository_url: &str,
    token: &str,
) -> Result<ProfileRecord, SettingsError> {
    let name = required("name", name)?;
    let repository_url = required("repository URL", repository_url)?;
    if token.is_empty() {
        return Err(SettingsError::InvalidProfile("token must not be empty".into()));
    }

    let mut store = load_at(home)?;
    if store.profiles.iter().any(|p| p.name == name) {
        return Err(SettingsError::DuplicateProfile(name.to_string()));
    }

    let now = Utc::now();
    let record = ProfileRecord {
        id: ProfileId::generate(),
        name: name.to_string(),
        repository_url: repository_url.to_string(),
        token: token.to_string(),
        created_at: now,
        updated_at: now,
    };
    store.profiles.push(record.clone());
    save_at(home, &store)?;
    Ok(record)
}

/// `add_at` convenience wrapper.
pub fn add(name: &str, repository_url: &str, token: &str) -> Result<ProfileRecord, SettingsError> {
    add_at(&home()?, name, repository_url, token)
}

/// Changes applied by [`update_at`]; `None` keeps the stored value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileUpdate<'a> {
    pub name: Option<&'a str>,
    pub repository_url: Option<&'a str>,
    pub token: Option<&'a str>,
}

impl ProfileUpdate<'_> {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.repository_url.is_none() && self.token.is_none()
    }
}

/// Edit the profile whose id or name equals `key` and bump `updated_at`.
///
/// The same rules as [`add_at`] apply to every supplied field; a rename may
/// not collide with another profile.
pub fn update_at(
    home: &Path,
    key: &str,
    update: ProfileUpdate<'_>,
) -> Result<ProfileRecord, SettingsError> {
    if update.is_empty() {
        return Err(SettingsError::InvalidProfile("nothing to update".into()));
    }
    let name = update.name.map(|n| required("name", n)).transpose()?;
    let repository_url = update
        .repository_url
        .map(|u| required("repository URL", u))
        .transpose()?;
    if update.token.is_some_and(str::is_empty) {
        return Err(SettingsError::InvalidProfile("token must not be empty".into()));
    }

    let mut store = load_at(home)?;
    let index = store
        .profiles
        .iter()
        .position(|p| p.matches(key))
        .ok_or_else(|| SettingsError::ProfileNotFound(key.to_string()))?;
    if let Some(name) = name {
        let taken = store
            .profiles
            .iter()
            .enumerate()
            .any(|(i, p)| i != index && p.name == name);
        if taken {
            return Err(SettingsError::DuplicateProfile(name.to_string()));
        }
    }

    let record = &mut store.profiles[index];
    if let Some(name) = name {
        record.name = name.to_string();
    }
    if let Some(url) = repository_url {
        record.repository_url = url.to_string();
    }
    if let Some(token) = update.token {
        record.token = token.to_string();
    }
    record.updated_at = Utc::now();
    let updated = record.clone();
    save_at(home, &store)?;
    Ok(updated)
}

/// `update_at` convenience wrapper.
pub fn update(key: &str, update: ProfileUpdate<'_>) -> Result<ProfileRecord, SettingsError> {
    update_at(&home()?, key, update)
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, SettingsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SettingsError::InvalidProfile(format!("{field} must not be empty")));
    }
    Ok(value)
}

/// Remove the profile whose id or name equals `key`.
pub fn remove_at(home: &Path, key: &str) -> Result<ProfileRecord, SettingsError> {
    let mut store = load_at(home)?;
    let index = store
        .profiles
        .iter()
        .position(|p| p.matches(key))
        .ok_or_else(|| SettingsError::ProfileNotFound(key.to_string()))?;
    let removed = store.profiles.remove(index);
    save_at(home, &store)?;
    Ok(removed)
}

/// `remove_at` convenience wrapper.
pub fn remove(key: &str) -> Result<ProfileRecord, SettingsError> {
    remove_at(&home()?, key)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
