//! Workspace stager.
//!
//! [`stage`] copies the project tree into a fresh directory under the scratch
//! root, pruning excluded names at every depth. The returned
//! [`StagedWorkspace`] owns that directory and removes it when dropped, so
//! cleanup happens on success, on error and when a task is cancelled.
//!
//! Entries that disappear mid-walk (a concurrent writer deleted them) count
//! as "nothing to copy". FIFOs, sockets and device nodes are skipped. Every
//! other I/O error aborts staging.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;
use walkdir::{DirEntry, WalkDir};

use reposync_core::Settings;

use crate::error::{io_err, StagingError};

/// Where to stage and what to leave out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOptions {
    /// Parent of every staged directory. Never copied into a snapshot.
    pub scratch_root: PathBuf,
    /// File or directory names pruned at any depth.
    pub exclude_names: BTreeSet<String>,
}

impl StageOptions {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            scratch_root: scratch_root.into(),
            exclude_names: BTreeSet::new(),
        }
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_names.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn from_settings(settings: &Settings, project_root: &Path) -> Self {
        Self::new(settings.scratch_root(project_root)).exclude(settings.exclude.iter().cloned())
    }
}

/// Counts gathered while copying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub files: usize,
    pub dirs: usize,
    pub symlinks: usize,
    /// Entries that vanished between listing and copying.
    pub vanished: usize,
    /// FIFOs, sockets and device nodes left out of the snapshot.
    pub special: usize,
}

/// A filtered snapshot of the source tree in its own temporary directory.
#[derive(Debug)]
pub struct StagedWorkspace {
    dir: TempDir,
    stats: StageStats,
}

impl StagedWorkspace {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn stats(&self) -> StageStats {
        self.stats
    }

    /// Remove the directory now, reporting any removal error.
    pub fn close(self) -> Result<(), StagingError> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| io_err(path, e))
    }

    /// [`close`](Self::close) on the blocking thread pool.
    pub async fn close_async(self) -> Result<(), StagingError> {
        tokio::task::spawn_blocking(move || self.close())
            .await
            .map_err(|err| StagingError::Join(err.to_string()))?
    }
}

/// Stage `source_root` into a new directory under `options.scratch_root`.
pub fn stage(source_root: &Path, options: &StageOptions) -> Result<StagedWorkspace, StagingError> {
    fs::create_dir_all(&options.scratch_root).map_err(|e| io_err(&options.scratch_root, e))?;
    let scratch_root = fs::canonicalize(&options.scratch_root)
        .map_err(|e| io_err(&options.scratch_root, e))?;

    let prefix = format!("stage-{}-", Utc::now().format("%Y%m%dT%H%M%S%3fZ"));
    let dir = tempfile::Builder::new()
        .prefix(&prefix)
        .tempdir_in(&scratch_root)
        .map_err(|e| io_err(&scratch_root, e))?;

    let mut workspace = StagedWorkspace {
        dir,
        stats: StageStats::default(),
    };

    let source_root = match fs::canonicalize(source_root) {
        Ok(path) => path,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(source = %source_root.display(), "source tree missing; staging nothing");
            return Ok(workspace);
        }
        Err(e) => return Err(io_err(source_root, e)),
    };

    let dest_root = workspace.dir.path().to_path_buf();
    let walker = WalkDir::new(&source_root)
        .follow_links(false)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_pruned(entry, &options.exclude_names, &scratch_root));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if is_not_found(&err) => {
                workspace.stats.vanished += 1;
                continue;
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| source_root.clone());
                let source = err
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
                return Err(io_err(path, source));
            }
        };

        let Ok(relative) = entry.path().strip_prefix(&source_root) else {
            continue;
        };
        let dest = dest_root.join(relative);
        copy_entry(&entry, &dest, &mut workspace.stats)?;
    }

    tracing::debug!(
        staged = %dest_root.display(),
        files = workspace.stats.files,
        dirs = workspace.stats.dirs,
        vanished = workspace.stats.vanished,
        special = workspace.stats.special,
        "workspace staged"
    );
    Ok(workspace)
}

/// [`stage`] on the blocking thread pool.
pub async fn stage_async(
    source_root: PathBuf,
    options: StageOptions,
) -> Result<StagedWorkspace, StagingError> {
    tokio::task::spawn_blocking(move || stage(&source_root, &options))
        .await
        .map_err(|err| StagingError::Join(err.to_string()))?
}

fn is_pruned(entry: &DirEntry, exclude: &BTreeSet<String>, scratch_root: &Path) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    if entry.path() == scratch_root {
        return true;
    }
    entry
        .file_name()
        .to_str()
        .is_some_and(|name| exclude.contains(name))
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|e| e.kind() == ErrorKind::NotFound)
}

fn copy_entry(entry: &DirEntry, dest: &Path, stats: &mut StageStats) -> Result<(), StagingError> {
    let file_type = entry.file_type();
    let result = if file_type.is_dir() {
        fs::create_dir_all(dest).map(|()| stats.dirs += 1)
    } else if file_type.is_symlink() {
        copy_symlink(entry.path(), dest).map(|copied| {
            if copied {
                stats.symlinks += 1;
            }
        })
    } else if file_type.is_file() {
        fs::copy(entry.path(), dest).map(|_| stats.files += 1)
    } else {
        // Opening a FIFO for reading blocks until a writer appears.
        tracing::debug!(path = %entry.path().display(), "skipping special file");
        stats.special += 1;
        Ok(())
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            stats.vanished += 1;
            Ok(())
        }
        Err(e) => Err(io_err(entry.path(), e)),
    }
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dest: &Path) -> std::io::Result<bool> {
    let target = fs::read_link(src)?;
    std::os::unix::fs::symlink(target, dest)?;
    Ok(true)
}

#[cfg(not(unix))]
fn copy_symlink(_src: &Path, _dest: &Path) -> std::io::Result<bool> {
    Ok(false)
}
