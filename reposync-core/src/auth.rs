//! Settings gate.
//!
//! Syncing is destructive, so `reposync_sync::Orchestrator::sync_all` requires
//! a [`SettingsUnlocked`] value. The only way to obtain one is
//! [`SettingsGate::unlock`], which checks the caller-supplied password
//! against the SHA-256 digest stored in the settings file.

use sha2::{Digest, Sha256};

use crate::error::SettingsError;
use crate::settings::Settings;

/// Proof that the caller passed the settings gate.
#[derive(Debug)]
pub struct SettingsUnlocked {
    _private: (),
}

#[derive(Debug, Clone)]
pub struct SettingsGate {
    expected: Option<[u8; 32]>,
}

impl SettingsGate {
    /// A gate with no password configured. Any attempt unlocks it.
    pub fn open() -> Self {
        Self { expected: None }
    }

    pub fn with_password(password: &str) -> Self {
        Self {
            expected: Some(digest(password)),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, SettingsError> {
        let Some(hex_digest) = settings.settings_password_sha256.as_deref() else {
            return Ok(Self::open());
        };
        let bytes = hex::decode(hex_digest.trim()).map_err(|_| SettingsError::InvalidPasswordDigest)?;
        let expected: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SettingsError::InvalidPasswordDigest)?;
        Ok(Self {
            expected: Some(expected),
        })
    }

    pub fn is_open(&self) -> bool {
        self.expected.is_none()
    }

    pub fn unlock(&self, attempt: Option<&str>) -> Result<SettingsUnlocked, SettingsError> {
        let Some(expected) = self.expected else {
            return Ok(SettingsUnlocked { _private: () });
        };
        let Some(attempt) = attempt else {
            return Err(SettingsError::Locked);
        };
        let given = digest(attempt);
        // Compare every byte regardless of where the first mismatch is.
        let diff = expected
            .iter()
            .zip(given.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        if diff != 0 {
            return Err(SettingsError::Locked);
        }
        Ok(SettingsUnlocked { _private: () })
    }
}

/// Hex SHA-256 digest stored as `settings_password_sha256`.
pub fn hash_password(password: &str) -> String {
    hex::encode(digest(password))
}

fn digest(password: &str) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(password.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&h.finalize());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_gate_unlocks_without_password() {
        let gate = SettingsGate::open();
        assert!(gate.is_open());
        assert!(gate.unlock(None).is_ok());
        assert!(gate.unlock(Some("anything")).is_ok());
    }

    #[test]
    fn password_gate_requires_matching_password() {
        let gate = SettingsGate::with_password("hunter2");
        assert!(!gate.is_open());
        assert!(matches!(gate.unlock(None), Err(SettingsError::Locked)));
        assert!(matches!(gate.unlock(Some("hunter3")), Err(SettingsError::Locked)));
        assert!(gate.unlock(Some("hunter2")).is_ok());
    }

    #[test]
    fn gate_from_settings_uses_stored_digest() {
        let settings = Settings {
            settings_password_sha256: Some(hash_password("s3cret")),
            ..Settings::default()
        };
        let gate = SettingsGate::from_settings(&settings).unwrap();
        assert!(gate.unlock(Some("s3cret")).is_ok());
        assert!(gate.unlock(Some("nope")).is_err());
    }

    #[test]
    fn malformed_digest_is_rejected() {
        for bad in ["zz", "abcd"] {
            let settings = Settings {
                settings_password_sha256: Some(bad.to_string()),
                ..Settings::default()
            };
            let err = SettingsGate::from_settings(&settings).unwrap_err();
            assert!(matches!(err, SettingsError::InvalidPasswordDigest));
        }
    }

    #[test]
    fn hash_password_is_hex_sha256() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
