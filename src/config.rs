use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::version::registries::github::DEFAULT_BASE_URL;
use crate::version::types::RepoId;

/// Default refresh interval (24 hours)
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default timeout for a single HTTP request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Not a valid URL: {0}")]
    InvalidUrl(String),

    #[error("Current version must not be empty")]
    EmptyVersion,
}

/// Settings for one add-on's update engine.
///
/// Built once by the host integration and handed to [`crate::updater::Updater`].
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    pub api_url: String,
    pub repo: RepoId,
    pub token: Option<String>,
    /// Version embedded in the running add-on
    pub current_version: String,
    /// Directory holding the add-on's files
    pub install_dir: PathBuf,
    /// Location of the JSON side-file
    pub state_path: PathBuf,
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    /// Paths relative to `install_dir` carried over into a new release
    pub preserve: Vec<PathBuf>,
}

impl UpdaterConfig {
    pub fn new(
        repo: RepoId,
        current_version: impl Into<String>,
        install_dir: impl Into<PathBuf>,
    ) -> Self {
        let state_path = default_state_path(&repo);
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            repo,
            token: None,
            current_version: current_version.into(),
            install_dir: install_dir.into(),
            state_path,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            preserve: Vec::new(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_state_path(mut self, state_path: impl Into<PathBuf>) -> Self {
        self.state_path = state_path.into();
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_preserve(mut self, preserve: Vec<PathBuf>) -> Self {
        self.preserve = preserve;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_api_url(&self.api_url)?;
        if self.current_version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        Ok(())
    }

    /// Fallback release page when no poll result carries one
    pub fn releases_page(&self) -> String {
        format!(
            "https://github.com/{}/{}/releases",
            self.repo.owner, self.repo.name
        )
    }
}

/// Accepts only http(s) URLs with a host
pub fn validate_api_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(url.to_string()));
    }

    Ok(())
}

/// Returns the path to the data directory for addon-updater.
/// Uses $XDG_DATA_HOME/addon-updater if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/addon-updater,
/// or ./addon-updater if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

/// Returns the path to the log file.
pub fn log_path() -> PathBuf {
    data_dir().join("addon-updater.log")
}

/// Returns the default side-file location for a repository.
pub fn default_state_path(repo: &RepoId) -> PathBuf {
    data_dir()
        .join("state")
        .join(format!("{}__{}.json", repo.owner, repo.name))
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join("addon-updater")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn data_dir_with_env_uses_xdg_data_home_when_set() {
        let path = data_dir_with_env(
            Some("/tmp/test-data".to_string()),
            Some(PathBuf::from("/home/user")),
        );

        assert_eq!(path, PathBuf::from("/tmp/test-data/addon-updater"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_home_local_share() {
        let path = data_dir_with_env(None, Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.local/share/addon-updater"));
    }

    #[test]
    fn data_dir_with_env_ignores_empty_xdg_data_home() {
        let path = data_dir_with_env(Some(String::new()), Some(PathBuf::from("/home/user")));

        assert_eq!(path, PathBuf::from("/home/user/.local/share/addon-updater"));
    }

    #[test]
    fn data_dir_with_env_falls_back_to_current_dir_when_no_dirs_available() {
        let path = data_dir_with_env(None, None);
        assert_eq!(path, PathBuf::from("./addon-updater"));
    }

    #[rstest]
    #[case("https://api.github.com", true)]
    #[case("http://127.0.0.1:8080", true)]
    #[case("https://ghe.example.com/api/v3", true)]
    #[case("ftp://api.github.com", false)]
    #[case("api.github.com", false)]
    #[case("", false)]
    fn validate_api_url_accepts_only_http_urls(#[case] url: &str, #[case] valid: bool) {
        assert_eq!(validate_api_url(url).is_ok(), valid);
    }

    #[test]
    fn new_config_uses_defaults() {
        let config = UpdaterConfig::new(RepoId::new("kents00", "KLicense"), "1.3.11", "/addons/k");

        assert_eq!(config.api_url, "https://api.github.com");
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
        assert!(config.token.is_none());
        assert!(config.state_path.ends_with("state/kents00__KLicense.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn with_token_drops_blank_tokens() {
        let config = UpdaterConfig::new(RepoId::new("a", "b"), "1.0.0", "/tmp/b")
            .with_token(Some("  ".to_string()));

        assert!(config.token.is_none());
    }

    #[test]
    fn validate_rejects_empty_current_version() {
        let config = UpdaterConfig::new(RepoId::new("a", "b"), " ", "/tmp/b");

        assert!(matches!(config.validate(), Err(ConfigError::EmptyVersion)));
    }

    #[test]
    fn releases_page_points_at_repository() {
        let config = UpdaterConfig::new(RepoId::new("kents00", "KLicense"), "1.0.0", "/tmp/k");

        assert_eq!(
            config.releases_page(),
            "https://github.com/kents00/KLicense/releases"
        );
    }
}
