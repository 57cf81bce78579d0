//! GitHub Releases API implementation

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::version::error::RegistryError;
use crate::version::registry::ReleaseRegistry;
use crate::version::types::{Release, RepoId};

/// Default base URL for the GitHub REST API
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const USER_AGENT: &str = concat!("addon-updater/", env!("CARGO_PKG_VERSION"));

/// Registry implementation for the GitHub Releases API
pub struct GitHubRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl GitHubRegistry {
    /// Creates a new GitHubRegistry against `base_url`.
    ///
    /// When `token` is set every request carries it as a bearer token.
    pub fn new(
        base_url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| RegistryError::InvalidResponse(format!("invalid token: {}", e)))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn latest_release_url(&self, repo: &RepoId) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.base_url, repo.owner, repo.name
        )
    }

    fn zipball_url(&self, repo: &RepoId, release: &Release) -> String {
        release.zipball_url.clone().unwrap_or_else(|| {
            format!(
                "{}/repos/{}/{}/zipball/{}",
                self.base_url, repo.owner, repo.name, release.tag_name
            )
        })
    }

    /// Maps non-success statuses to registry errors
    fn check_status(
        response: &reqwest::Response,
        repo: &RepoId,
        url: &str,
    ) -> Result<(), RegistryError> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound(repo.to_string()));
        }

        if status == StatusCode::TOO_MANY_REQUESTS
            || (status == StatusCode::FORBIDDEN && rate_limit_exhausted(response.headers()))
        {
            warn!("GitHub rate limit exhausted: {}", url);
            return Err(RegistryError::RateLimited(repo.to_string()));
        }

        if !status.is_success() {
            warn!("GitHub returned status {}: {}", status, url);
            return Err(RegistryError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        Ok(())
    }
}

fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

#[async_trait::async_trait]
impl ReleaseRegistry for GitHubRegistry {
    async fn fetch_latest_release(&self, repo: &RepoId) -> Result<Release, RegistryError> {
        let url = self.latest_release_url(repo);
        debug!("Fetching latest release: {}", url);

        let response = self.client.get(&url).send().await?;
        Self::check_status(&response, repo, &url)?;

        let release: Release = response.json().await.map_err(|e| {
            warn!("Failed to parse GitHub release response: {}", e);
            RegistryError::InvalidResponse(e.to_string())
        })?;

        if release.tag_name.trim().is_empty() {
            return Err(RegistryError::InvalidResponse(
                "release has an empty tag_name".to_string(),
            ));
        }

        Ok(release)
    }

    async fn download_archive(
        &self,
        repo: &RepoId,
        release: &Release,
    ) -> Result<Vec<u8>, RegistryError> {
        let url = self.zipball_url(repo, release);
        debug!("Downloading release archive: {}", url);

        let response = self.client.get(&url).send().await?;
        Self::check_status(&response, repo, &url)?;

        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn registry(server: &ServerGuard, token: Option<&str>) -> GitHubRegistry {
        GitHubRegistry::new(&server.url(), token, Duration::from_secs(5)).unwrap()
    }

    fn repo() -> RepoId {
        RepoId::new("kents00", "KLicense")
    }

    #[tokio::test]
    async fn fetch_latest_release_returns_tag_and_urls() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .match_header("accept", "application/vnd.github+json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "tag_name": "v1.4.0",
                    "name": "Summer release",
                    "html_url": "https://github.com/kents00/KLicense/releases/tag/v1.4.0",
                    "zipball_url": "https://api.github.com/repos/kents00/KLicense/zipball/v1.4.0",
                    "body": "New panel",
                    "published_at": "2024-06-01T00:00:00Z"
                }"#,
            )
            .create_async()
            .await;

        let result = registry(&server, None)
            .fetch_latest_release(&repo())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.tag_name, "v1.4.0");
        assert_eq!(result.name.as_deref(), Some("Summer release"));
        assert_eq!(
            result.html_url.as_deref(),
            Some("https://github.com/kents00/KLicense/releases/tag/v1.4.0")
        );
    }

    #[tokio::test]
    async fn fetch_latest_release_sends_bearer_token_when_configured() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .match_header("authorization", "Bearer secret-token")
            .with_status(200)
            .with_body(r#"{"tag_name": "1.0.0"}"#)
            .create_async()
            .await;

        let result = registry(&server, Some("secret-token"))
            .fetch_latest_release(&repo())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.tag_name, "1.0.0");
    }

    #[tokio::test]
    async fn fetch_latest_release_omits_authorization_without_token() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"{"tag_name": "1.0.0"}"#)
            .create_async()
            .await;

        registry(&server, None)
            .fetch_latest_release(&repo())
            .await
            .unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_latest_release_returns_not_found_for_repo_without_releases() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        let result = registry(&server, None).fetch_latest_release(&repo()).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_latest_release_detects_rate_limit() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .with_status(403)
            .with_header("x-ratelimit-remaining", "0")
            .with_body(r#"{"message": "API rate limit exceeded"}"#)
            .create_async()
            .await;

        let result = registry(&server, None).fetch_latest_release(&repo()).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::RateLimited(_))));
    }

    #[tokio::test]
    async fn fetch_latest_release_rejects_malformed_json() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = registry(&server, None).fetch_latest_release(&repo()).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_latest_release_rejects_server_errors() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/releases/latest")
            .with_status(502)
            .create_async()
            .await;

        let result = registry(&server, None).fetch_latest_release(&repo()).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn download_archive_falls_back_to_zipball_endpoint() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/repos/kents00/KLicense/zipball/v1.4.0")
            .with_status(200)
            .with_header("content-type", "application/zip")
            .with_body(b"PK\x03\x04archive")
            .create_async()
            .await;

        let bytes = registry(&server, None)
            .download_archive(&repo(), &Release::new("v1.4.0"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"PK\x03\x04archive");
    }

    #[tokio::test]
    async fn download_archive_prefers_release_zipball_url() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/legacy.zip/v2.0.0")
            .with_status(200)
            .with_body("zip-bytes")
            .create_async()
            .await;

        let mut release = Release::new("v2.0.0");
        release.zipball_url = Some(format!("{}/legacy.zip/v2.0.0", server.url()));

        let bytes = registry(&server, None)
            .download_archive(&repo(), &release)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, b"zip-bytes");
    }
}
