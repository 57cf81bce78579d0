//! Registry trait for fetching release metadata and archives

use crate::version::error::RegistryError;
use crate::version::types::{Release, RepoId};

/// Trait for a hosting platform that publishes tagged releases
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReleaseRegistry: Send + Sync {
    /// Fetches the most recent published release of a repository
    ///
    /// # Returns
    /// * `Ok(Release)` - Metadata of the latest release
    /// * `Err(RegistryError::NotFound)` - If the repository has no releases
    async fn fetch_latest_release(&self, repo: &RepoId) -> Result<Release, RegistryError>;

    /// Downloads the zip archive of a release
    async fn download_archive(
        &self,
        repo: &RepoId,
        release: &Release,
    ) -> Result<Vec<u8>, RegistryError>;
}
