//! reposync core library: domain types, settings, profile store, errors.
//!
//! Public API surface:
//! - [`types`]: credentials, profiles, per-profile outcomes and the aggregate report
//! - [`settings`]: the `~/.reposync/config.yaml` settings file
//! - [`profiles`]: persisted sync profiles (`~/.reposync/profiles.yaml`)
//! - [`auth`]: the settings gate and the [`SettingsUnlocked`] capability
//! - [`error`]: [`SettingsError`], [`InvalidInputError`], [`AggregateFailure`]

pub mod auth;
pub mod error;
mod fs_atomic;
pub mod profiles;
pub mod settings;
pub mod types;

pub use auth::{SettingsGate, SettingsUnlocked};
pub use error::{AggregateFailure, InvalidInputError, SettingsError};
pub use settings::{CommitterIdentity, PushPolicy, Settings};
pub use types::{Credential, ProfileId, SyncOutcome, SyncProfile, SyncReport};
