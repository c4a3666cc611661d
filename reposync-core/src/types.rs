//! Domain types for mirror syncs.
//!
//! A [`SyncProfile`] names one destination. Every sync attempt yields exactly
//! one [`SyncOutcome`]; a [`SyncReport`] aggregates the outcomes of one
//! invocation in input order.

use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::AggregateFailure;

/// Longest error summary included in a report line.
pub const MAX_SUMMARY_CHARS: usize = 300;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Stable identifier of a stored profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub String);

impl ProfileId {
    /// Fresh random identifier (8 hex characters).
    pub fn generate() -> Self {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ProfileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProfileId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// An access token for a remote repository.
///
/// `Debug` and `Display` print `[REDACTED]` and the type has no
/// `Serialize` impl. Call [`Credential::expose`] only where the value is
/// handed to the transport.
#[derive(Clone)]
pub struct Credential(SecretString);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// The raw token. Must not be logged, persisted or returned to callers.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// One sync destination: a repository URL and the credential used to push.
#[derive(Debug, Clone)]
pub struct SyncProfile {
    /// Display name; carries no behavior.
    pub name: Option<String>,
    pub repository_url: String,
    pub credential: Credential,
}

impl SyncProfile {
    pub fn new(repository_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            name: None,
            repository_url: repository_url.into(),
            credential,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Reporting identity: the repository URL without any userinfo.
    pub fn identity(&self) -> String {
        strip_userinfo(&self.repository_url)
    }
}

/// Remove a `user[:password]@` section from a URL authority.
///
/// URLs without a `scheme://` prefix are returned unchanged. An unencoded
/// `/` inside the password (`https://u:pa/ss@host/r`) is still treated as
/// userinfo, so the secret never survives into a reported identity.
pub fn strip_userinfo(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let authority_start = scheme_end + 3;
    let rest = &url[authority_start..];
    match userinfo_end(rest) {
        Some(at) => format!("{}{}", &url[..authority_start], &rest[at + 1..]),
        None => url.to_string(),
    }
}

/// Byte offset of the `@` closing the userinfo in `rest` (the URL after `scheme://`).
fn userinfo_end(rest: &str) -> Option<usize> {
    let authority_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_len];
    if let Some(at) = authority.rfind('@') {
        return Some(at);
    }

    // `user:pa` before the first `/` is a truncated password, not `host:port`.
    let colon = authority.rfind(':')?;
    let port = &authority[colon + 1..];
    if authority.starts_with('[') || port.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let path_end = rest.find(['?', '#']).unwrap_or(rest.len());
    rest[..path_end].rfind('@').filter(|at| *at > authority_len)
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of syncing one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub profile_identity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub succeeded: bool,
    pub detail_message: String,
    pub duration_ms: u64,
}

impl SyncOutcome {
    pub fn success(profile: &SyncProfile, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(profile, true, detail.into(), elapsed)
    }

    pub fn failure(profile: &SyncProfile, detail: impl Into<String>, elapsed: Duration) -> Self {
        Self::new(profile, false, detail.into(), elapsed)
    }

    fn new(profile: &SyncProfile, succeeded: bool, detail: String, elapsed: Duration) -> Self {
        Self {
            profile_identity: profile.identity(),
            name: profile.name.clone(),
            succeeded,
            detail_message: detail,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// One line of the composite report message.
    pub fn report_line(&self) -> String {
        if self.succeeded {
            format!("✅ {}: success.", self.profile_identity)
        } else {
            format!(
                "❌ {}: failed - {}",
                self.profile_identity,
                short_summary(&self.detail_message)
            )
        }
    }
}

/// Last non-empty line of `detail`, truncated to [`MAX_SUMMARY_CHARS`].
pub fn short_summary(detail: &str) -> String {
    let line = detail
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .unwrap_or("unknown error");
    if line.chars().count() <= MAX_SUMMARY_CHARS {
        return line.to_string();
    }
    let mut truncated: String = line.chars().take(MAX_SUMMARY_CHARS).collect();
    truncated.push('…');
    truncated
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Aggregate of every outcome of one sync invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// True iff every outcome succeeded.
    pub all_succeeded: bool,
    pub message: String,
    pub outcomes: Vec<SyncOutcome>,
}

impl SyncReport {
    pub fn from_outcomes(outcomes: Vec<SyncOutcome>) -> Self {
        let attempted = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        let failed = attempted - succeeded;

        let mut message =
            format!("Sync finished. Succeeded: {succeeded}. Failed: {failed}.\n\n");
        for outcome in &outcomes {
            message.push_str(&outcome.report_line());
            message.push('\n');
        }

        Self {
            attempted,
            succeeded,
            failed,
            all_succeeded: failed == 0,
            message,
            outcomes,
        }
    }

    pub fn is_success(&self) -> bool {
        self.all_succeeded
    }

    /// `Ok(self)` when every profile succeeded, otherwise [`AggregateFailure`]
    /// carrying the full report.
    pub fn into_result(self) -> Result<SyncReport, AggregateFailure> {
        if self.is_success() {
            return Ok(self);
        }
        Err(AggregateFailure {
            attempted: self.attempted,
            failed: self.failed,
            report: self,
        })
    }

    /// Outcomes that failed, for retrying just that subset.
    pub fn failed_outcomes(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
