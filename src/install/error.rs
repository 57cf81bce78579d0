use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to read archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry escapes the install directory: {0}")]
    UnsafeEntry(String),

    #[error("Archive contains no files")]
    EmptyArchive,

    #[error("Install directory has no parent or name: {0:?}")]
    InvalidInstallDir(PathBuf),

    #[error("Preserved path must be relative and stay inside the install directory: {0:?}")]
    InvalidPreservePath(PathBuf),

    #[error("Could not restore previous install from {backup:?}; new files kept at {staged:?}: {source}")]
    RestoreFailed {
        backup: PathBuf,
        staged: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| InstallError::Io { path, source }
    }
}
