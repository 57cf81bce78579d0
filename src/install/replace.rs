//! Staged replacement of an installed add-on directory

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::install::error::InstallError;

const STAGING_MARKER: &str = ".staging-";
const BACKUP_MARKER: &str = ".backup-";

/// Result of swapping a staged tree into place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceReport {
    /// Backup that could not be removed (e.g. files still held open by the
    /// host process). Removed later by [`cleanup_leftovers`].
    pub leftover_backup: Option<PathBuf>,
}

/// Splits `install_dir` into its parent and directory name
fn split_install_dir(install_dir: &Path) -> Result<(&Path, OsString), InstallError> {
    let invalid = || InstallError::InvalidInstallDir(install_dir.to_path_buf());
    let name = install_dir.file_name().ok_or_else(invalid)?;
    let parent = install_dir
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((parent, name.to_os_string()))
}

fn sibling_prefix(name: &OsString, marker: &str) -> String {
    format!(".{}{}", name.to_string_lossy(), marker)
}

/// Creates an empty staging directory next to `install_dir`.
///
/// Staging on the same filesystem keeps the final swap a pair of renames.
pub fn create_staging(install_dir: &Path) -> Result<TempDir, InstallError> {
    let (parent, name) = split_install_dir(install_dir)?;
    std::fs::create_dir_all(parent).map_err(InstallError::io(parent))?;

    tempfile::Builder::new()
        .prefix(&sibling_prefix(&name, STAGING_MARKER))
        .tempdir_in(parent)
        .map_err(InstallError::io(parent))
}

/// Replaces `install_dir` with the contents of `staged`.
///
/// Entries listed in `preserve` are copied from the live install into the
/// staged tree first, unless the new release ships its own copy.
pub fn replace_dir(
    install_dir: &Path,
    staged: TempDir,
    preserve: &[PathBuf],
) -> Result<ReplaceReport, InstallError> {
    for relative in preserve {
        carry_over(install_dir, staged.path(), relative)?;
    }

    let staged_path = staged.keep();
    swap_into_place(install_dir, &staged_path).inspect_err(|e| {
        // Both trees are needed to recover by hand
        if matches!(e, InstallError::RestoreFailed { .. }) {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&staged_path) {
            warn!("Failed to remove staging directory {:?}: {}", staged_path, e);
        }
    })
}

fn carry_over(install_dir: &Path, staged_dir: &Path, relative: &Path) -> Result<(), InstallError> {
    let is_safe = !relative.as_os_str().is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !is_safe {
        return Err(InstallError::InvalidPreservePath(relative.to_path_buf()));
    }

    let source = install_dir.join(relative);
    let target = staged_dir.join(relative);

    if !source.exists() {
        return Ok(());
    }
    if target.exists() {
        debug!("Release ships {:?}, not preserving old copy", relative);
        return Ok(());
    }

    if source.is_dir() {
        copy_dir_recursive(&source, &target)?;
    } else {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(InstallError::io(parent))?;
        }
        std::fs::copy(&source, &target).map_err(InstallError::io(&source))?;
    }

    debug!("Preserved {:?}", relative);
    Ok(())
}

/// Moves the live directory aside, moves `staged_path` into its place and
/// restores the live directory if the second move fails.
fn swap_into_place(install_dir: &Path, staged_path: &Path) -> Result<ReplaceReport, InstallError> {
    let (parent, name) = split_install_dir(install_dir)?;

    let backup = if install_dir.exists() {
        let backup = parent.join(format!(
            "{}{}",
            sibling_prefix(&name, BACKUP_MARKER),
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));
        std::fs::rename(install_dir, &backup).map_err(InstallError::io(install_dir))?;
        debug!("Moved {:?} aside to {:?}", install_dir, backup);
        Some(backup)
    } else {
        None
    };

    if let Err(source) = std::fs::rename(staged_path, install_dir) {
        warn!(
            "Failed to move {:?} into {:?}: {}",
            staged_path, install_dir, source
        );
        if let Some(backup) = &backup {
            std::fs::rename(backup, install_dir).map_err(|source| {
                warn!("Failed to restore {:?} from {:?}: {}", install_dir, backup, source);
                InstallError::RestoreFailed {
                    backup: backup.clone(),
                    staged: staged_path.to_path_buf(),
                    source,
                }
            })?;
            info!("Restored previous install at {:?}", install_dir);
        }
        return Err(InstallError::Io {
            path: install_dir.to_path_buf(),
            source,
        });
    }

    let leftover_backup = backup.and_then(|backup| match std::fs::remove_dir_all(&backup) {
        Ok(()) => None,
        Err(e) => {
            warn!("Failed to remove backup {:?}: {}", backup, e);
            Some(backup)
        }
    });

    info!("Installed new files at {:?}", install_dir);
    Ok(ReplaceReport { leftover_backup })
}

/// Removes staging and backup directories left next to `install_dir` by
/// interrupted or partially cleaned updates. Returns how many were removed.
///
/// Backups are kept while `install_dir` is missing, since one of them is
/// then the only copy of the add-on.
pub fn cleanup_leftovers(install_dir: &Path) -> Result<usize, InstallError> {
    let (parent, name) = split_install_dir(install_dir)?;
    let keep_backups = !install_dir.exists();
    let staging_prefix = sibling_prefix(&name, STAGING_MARKER);
    let backup_prefix = sibling_prefix(&name, BACKUP_MARKER);

    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(InstallError::io(parent)(e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.map_err(InstallError::io(parent))?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();

        let is_backup = file_name.starts_with(&backup_prefix);
        if !(file_name.starts_with(&staging_prefix) || is_backup) {
            continue;
        }
        if is_backup && keep_backups {
            warn!("Keeping backup {:?}: {:?} is missing", entry.path(), install_dir);
            continue;
        }

        let path = entry.path();
        std::fs::remove_dir_all(&path).map_err(InstallError::io(&path))?;
        debug!("Removed leftover {:?}", path);
        removed += 1;
    }

    Ok(removed)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<(), InstallError> {
    std::fs::create_dir_all(dst).map_err(InstallError::io(dst))?;

    for entry in std::fs::read_dir(src).map_err(InstallError::io(src))? {
        let entry = entry.map_err(InstallError::io(src))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).map_err(InstallError::io(&src_path))?;
        }
    }
    Ok(())
}
