//! Installation layer
//! - archive.rs: Zip extraction with root stripping and entry validation
//! - replace.rs: Staged swap of the add-on directory
//! - error.rs: InstallError

pub mod archive;
pub mod error;
pub mod replace;

use std::path::{Path, PathBuf};

use tracing::info;

pub use archive::{ExtractSummary, extract_archive};
pub use error::InstallError;
pub use replace::{ReplaceReport, cleanup_leftovers, create_staging, replace_dir};

/// Summary of a completed installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub extract: ExtractSummary,
    pub replace: ReplaceReport,
}

/// Extracts `archive` next to `install_dir` and swaps it into place.
///
/// The live directory is untouched until extraction has fully succeeded.
pub fn install_archive(
    archive: &[u8],
    install_dir: &Path,
    preserve: &[PathBuf],
) -> Result<InstallReport, InstallError> {
    let staging = create_staging(install_dir)?;
    let extract = extract_archive(archive, staging.path())?;
    let replace = replace_dir(install_dir, staging, preserve)?;

    info!(
        "Installed {} files into {:?}",
        extract.files, install_dir
    );
    Ok(InstallReport { extract, replace })
}
