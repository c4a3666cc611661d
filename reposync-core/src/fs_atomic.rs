//! Atomic `.tmp` + rename writes with owner-only permissions.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::{io_err, SettingsError};

/// Create `dir` (mode `0700`) if it does not yet exist.
pub(crate) fn ensure_private_dir(dir: &Path) -> Result<(), SettingsError> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        set_dir_permissions(dir)?;
    }
    Ok(())
}

/// Write `contents` to `path` through a sibling `.tmp` file.
///
/// The tmp file is created with mode `0600`, so neither it nor the renamed
/// file is ever readable by other users.
pub(crate) fn write_private(path: &Path, contents: &str) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        ensure_private_dir(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let written = open_private(&tmp).and_then(|mut file| {
        file.write_all(contents.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| io_err(&tmp, e))
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Create `path` fresh with owner-only permissions.
///
/// A leftover file from an interrupted write is removed first; it may carry
/// wider permissions that `create` would keep.
fn open_private(path: &Path) -> Result<File, SettingsError> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path, e)),
    }
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|e| io_err(path, e))
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), SettingsError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), SettingsError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_private_leaves_no_tmp_behind() {
        let home = TempDir::new().unwrap();
        let path = home.path().join("nested").join("file.yaml");
        write_private(&path, "a: 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a: 1\n");
        assert!(!path.with_file_name("file.yaml.tmp").exists());
    }

    #[test]
    #[cfg(unix)]
    fn write_private_sets_owner_only_modes() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let dir = home.path().join("private");
        let path = dir.join("secret.yaml");
        write_private(&path, "token: x\n").unwrap();

        let file_mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600);
        assert_eq!(dir_mode, 0o700);
    }

    #[test]
    #[cfg(unix)]
    fn tmp_file_is_owner_only_from_creation() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let tmp = home.path().join("profiles.yaml.tmp");
        let file = open_private(&tmp).unwrap();
        let mode = file.metadata().unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[test]
    #[cfg(unix)]
    fn leftover_world_readable_tmp_is_replaced() {
        use std::os::unix::fs::PermissionsExt;

        let home = TempDir::new().unwrap();
        let path = home.path().join("profiles.yaml");
        let tmp = home.path().join("profiles.yaml.tmp");
        std::fs::write(&tmp, "stale").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, "token: x\n").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "token: x\n");
        assert!(!tmp.exists());
    }
}
