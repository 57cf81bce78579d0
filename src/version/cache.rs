//! JSON side-file holding the last poll result between host sessions

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::version::error::StateError;
use crate::version::types::VersionState;

/// File name used for the side-file
pub const SIDE_FILE_NAME: &str = "version_info.json";

pub struct StateCache {
    path: PathBuf,
}

impl StateCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the side-file. A missing file means no check has been recorded.
    pub fn load(&self) -> Result<Option<VersionState>, StateError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let state = serde_json::from_str(&content).map_err(|source| StateError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(state))
    }

    /// Writes the side-file through a temporary file so readers never see a
    /// partially written document.
    pub fn save(&self, state: &VersionState) -> Result<(), StateError> {
        let io_err = |source: std::io::Error| StateError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(io_err)?;

        let json = serde_json::to_string_pretty(state).map_err(|source| StateError::Malformed {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(io_err)?;
        tmp.write_all(json.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;

        debug!("Side-file written to {:?}", self.path);
        Ok(())
    }

    /// Deletes the side-file. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, StateError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed side-file {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state() -> VersionState {
        VersionState {
            current_version: "1.3.11".to_string(),
            latest_version: "v1.4.0".to_string(),
            update_date: "2024-06-01T12:00:00Z".parse().unwrap(),
            release_url: Some("https://github.com/kents00/KLicense/releases/tag/v1.4.0".into()),
        }
    }

    #[test]
    fn load_returns_none_when_side_file_is_missing() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StateCache::new(temp_dir.path().join(SIDE_FILE_NAME));

        assert_eq!(cache.load().unwrap(), None);
    }

    #[test]
    fn save_then_load_returns_same_state() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StateCache::new(temp_dir.path().join("nested").join(SIDE_FILE_NAME));

        cache.save(&state()).unwrap();

        assert_eq!(cache.load().unwrap(), Some(state()));
    }

    #[test]
    fn load_reads_side_file_without_release_url() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SIDE_FILE_NAME);
        std::fs::write(
            &path,
            r#"{
 "current_version": "1.3.11",
 "latest_version": "1.3.11",
 "update_date": "2024-06-01T12:00:00Z"
}"#,
        )
        .unwrap();

        let loaded = StateCache::new(&path).load().unwrap().unwrap();

        assert_eq!(loaded.latest_version, "1.3.11");
        assert_eq!(loaded.release_url, None);
        assert!(!loaded.update_available());
    }

    #[test]
    fn load_reports_malformed_side_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(SIDE_FILE_NAME);
        std::fs::write(&path, "{not json").unwrap();

        let result = StateCache::new(&path).load();

        assert!(matches!(result, Err(StateError::Malformed { .. })));
    }

    #[test]
    fn remove_deletes_side_file_once() {
        let temp_dir = TempDir::new().unwrap();
        let cache = StateCache::new(temp_dir.path().join(SIDE_FILE_NAME));
        cache.save(&state()).unwrap();

        assert!(cache.remove().unwrap());
        assert!(!cache.path().exists());
        assert!(!cache.remove().unwrap());
    }
}
