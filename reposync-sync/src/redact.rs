//! Credential injection and output scrubbing.
//!
//! The authenticated remote URL exists only inside an [`AuthenticatedRemote`]
//! for the duration of one publish. It is handed to the transport as a
//! command-line argument and never written to repository config. Anything
//! coming back from the transport passes through a [`Redactor`] before it is
//! logged or returned.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use reposync_core::types::strip_userinfo;
use reposync_core::Credential;

use crate::error::PublishError;

const MASK: &str = "***";

/// A remote URL with the credential embedded in its authority.
pub struct AuthenticatedRemote {
    display: String,
    url: SecretString,
}

impl AuthenticatedRemote {
    /// Build the push URL for `remote_url`.
    ///
    /// For `http://` and `https://` remotes the percent-encoded credential
    /// replaces any existing userinfo. Other transports (ssh, scp-like
    /// `git@host:path`, local paths, `file://`) authenticate out of band and
    /// are used unchanged.
    pub fn new(remote_url: &str, credential: &Credential) -> Result<Self, PublishError> {
        let remote_url = remote_url.trim();
        if remote_url.is_empty() {
            return Err(PublishError::InvalidRemote("remote URL is empty".into()));
        }
        if remote_url.starts_with('-') || remote_url.chars().any(char::is_control) {
            return Err(PublishError::InvalidRemote(strip_userinfo(remote_url)));
        }

        let display = strip_userinfo(remote_url);
        let url = match http_scheme_len(&display) {
            Some(prefix_len) if !credential.is_empty() => format!(
                "{}{}@{}",
                &display[..prefix_len],
                urlencoding::encode(credential.expose()),
                &display[prefix_len..]
            ),
            _ => remote_url.to_string(),
        };

        Ok(Self {
            display,
            url: SecretString::from(url),
        })
    }

    /// The remote URL without credentials; safe to log and report.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// The credential-bearing URL. Only for the transport's argument list.
    pub fn expose_url(&self) -> &str {
        self.url.expose_secret()
    }
}

impl fmt::Debug for AuthenticatedRemote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedRemote")
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}

/// Length of `scheme://` when the scheme is http or https.
fn http_scheme_len(url: &str) -> Option<usize> {
    let scheme_end = url.find("://")?;
    let scheme = &url[..scheme_end];
    (scheme.eq_ignore_ascii_case("https") || scheme.eq_ignore_ascii_case("http"))
        .then_some(scheme_end + 3)
}

/// Replaces credential material in transport output.
///
/// The authenticated URL is rewritten to its display form; the raw and
/// percent-encoded credential are masked wherever else they appear.
pub struct Redactor {
    replacements: Vec<(String, String)>,
}

impl Redactor {
    pub fn new(credential: &Credential, remote: &AuthenticatedRemote) -> Self {
        let mut replacements = Vec::new();
        if remote.expose_url() != remote.display() {
            replacements.push((remote.expose_url().to_string(), remote.display().to_string()));
        }
        let raw = credential.expose();
        if !raw.is_empty() {
            let encoded = urlencoding::encode(raw).into_owned();
            if encoded != raw {
                replacements.push((encoded, MASK.to_string()));
            }
            replacements.push((raw.to_string(), MASK.to_string()));
        }
        Self { replacements }
    }

    pub fn scrub(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (needle, replacement) in &self.replacements {
            if out.contains(needle.as_str()) {
                out = out.replace(needle.as_str(), replacement);
            }
        }
        out
    }
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("patterns", &self.replacements.len())
            .finish()
    }
}
