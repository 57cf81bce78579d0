//! Zip extraction for release archives

use std::fs::File;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::install::error::InstallError;
use crate::version::cache::SIDE_FILE_NAME;

/// What [`extract_archive`] wrote to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    /// Top-level directory removed from every entry (e.g. "owner-repo-1a2b3c4")
    pub stripped_prefix: Option<String>,
}

/// Extracts a release archive into `dest`.
///
/// Hosting platforms wrap source archives in a single directory named after
/// the repository and commit. When every entry shares such a directory it is
/// stripped so the add-on files land directly in `dest`.
pub fn extract_archive(bytes: &[u8], dest: &Path) -> Result<ExtractSummary, InstallError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive.by_index(i)?;
        let Some(path) = entry.enclosed_name() else {
            warn!("Rejecting archive entry {:?}", entry.name());
            return Err(InstallError::UnsafeEntry(entry.name().to_string()));
        };
        entries.push((path, entry.is_dir()));
    }

    let prefix = common_root(&entries);
    if let Some(prefix) = &prefix {
        debug!("Stripping archive root {:?}", prefix);
    }

    std::fs::create_dir_all(dest).map_err(InstallError::io(dest))?;

    let mut files = 0;
    for (i, (path, is_dir)) in entries.iter().enumerate() {
        let relative = match &prefix {
            Some(prefix) => path.strip_prefix(prefix).unwrap_or(path),
            None => path.as_path(),
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(relative);

        if *is_dir {
            std::fs::create_dir_all(&out_path).map_err(InstallError::io(&out_path))?;
            continue;
        }

        if relative.file_name().is_some_and(|name| name == SIDE_FILE_NAME) {
            debug!("Skipping side-file shipped in archive: {:?}", relative);
            continue;
        }

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(InstallError::io(parent))?;
        }

        let mut entry = archive.by_index(i)?;
        let mut outfile = File::create(&out_path).map_err(InstallError::io(&out_path))?;
        std::io::copy(&mut entry, &mut outfile).map_err(InstallError::io(&out_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode().map(|m| m & 0o777).filter(|m| m & 0o400 != 0) {
                std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode))
                    .map_err(InstallError::io(&out_path))?;
            }
        }

        files += 1;
    }

    if files == 0 {
        return Err(InstallError::EmptyArchive);
    }

    debug!("Extracted {} files into {:?}", files, dest);
    Ok(ExtractSummary {
        files,
        stripped_prefix: prefix.map(|p| p.to_string_lossy().into_owned()),
    })
}

/// Returns the directory shared by every entry, if there is exactly one and
/// no file sits beside it.
fn common_root(entries: &[(PathBuf, bool)]) -> Option<PathBuf> {
    let mut root: Option<&Path> = None;

    for (path, is_dir) in entries {
        let mut components = path.components().filter(|c| matches!(c, Component::Normal(_)));
        let first = Path::new(components.next()?.as_os_str());
        let nested = components.next().is_some();

        if !nested && !is_dir {
            return None;
        }

        match root {
            None => root = Some(first),
            Some(existing) if existing == first => {}
            Some(_) => return None,
        }
    }

    root.map(Path::to_path_buf)
}
