//! Version-check and self-replace engine

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::UpdaterConfig;
use crate::error::UpdateError;
use crate::install::{InstallReport, cleanup_leftovers, install_archive};
use crate::version::cache::StateCache;
use crate::version::registries::GitHubRegistry;
use crate::version::registry::ReleaseRegistry;
use crate::version::semver::CompareResult;
use crate::version::types::{Release, UpdateStatus, VersionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Reuse the cached result while it is younger than the refresh interval
    IfStale,
    /// Always ask the registry
    Force,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// New files are on disk; the host must reload the add-on to use them
    Updated {
        from: String,
        to: String,
        report: InstallReport,
    },
    /// Nothing to install
    UpToDate { current: String, latest: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub side_file_removed: bool,
    pub leftovers_removed: usize,
}

pub struct Updater {
    config: UpdaterConfig,
    registry: Arc<dyn ReleaseRegistry>,
    cache: StateCache,
    status: RwLock<Option<VersionState>>,
    release: Mutex<Option<Release>>,
    /// Version written to disk by an update in this session
    installed_version: Mutex<Option<String>>,
    check_lock: tokio::sync::Mutex<()>,
    update_lock: tokio::sync::Mutex<()>,
}

impl Updater {
    pub fn new(
        config: UpdaterConfig,
        registry: Arc<dyn ReleaseRegistry>,
    ) -> Result<Self, UpdateError> {
        config.validate()?;
        let cache = StateCache::new(&config.state_path);

        Ok(Self {
            config,
            registry,
            cache,
            status: RwLock::new(None),
            release: Mutex::new(None),
            installed_version: Mutex::new(None),
            check_lock: tokio::sync::Mutex::new(()),
            update_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Creates an updater backed by the GitHub Releases API
    pub fn github(config: UpdaterConfig) -> Result<Self, UpdateError> {
        config.validate()?;
        let registry = GitHubRegistry::new(
            &config.api_url,
            config.token.as_deref(),
            config.request_timeout,
        )?;
        Self::new(config, Arc::new(registry))
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    fn current_version(&self) -> String {
        self.installed_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.config.current_version.clone())
    }

    fn set_status(&self, state: VersionState) {
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = Some(state);
    }

    /// Returns the last poll result without touching the network.
    ///
    /// Falls back to the side-file written by a previous session. The
    /// running version always comes from this session, not the file.
    pub fn status(&self) -> UpdateStatus {
        if let Some(state) = self
            .status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return UpdateStatus::Checked(state);
        }

        match self.cache.load() {
            Ok(Some(mut state)) => {
                state.current_version = self.current_version();
                self.set_status(state.clone());
                UpdateStatus::Checked(state)
            }
            Ok(None) => UpdateStatus::Unknown,
            Err(e) => {
                warn!("Ignoring unreadable side-file: {}", e);
                UpdateStatus::Unknown
            }
        }
    }

    fn is_stale(&self, state: &VersionState) -> bool {
        let interval = chrono::Duration::from_std(self.config.refresh_interval)
            .unwrap_or(chrono::Duration::MAX);
        Utc::now().signed_duration_since(state.update_date) >= interval
    }

    /// Polls the registry for the latest release and records the result.
    ///
    /// Calls are serialized; a caller that waited on an in-flight check
    /// reuses its result when `mode` is [`CheckMode::IfStale`].
    pub async fn check(&self, mode: CheckMode) -> Result<UpdateStatus, UpdateError> {
        let _guard = self.check_lock.lock().await;

        if mode == CheckMode::IfStale {
            if let UpdateStatus::Checked(state) = self.status() {
                if !self.is_stale(&state) {
                    debug!("Using cached release check from {}", state.update_date);
                    return Ok(UpdateStatus::Checked(state));
                }
            }
        }

        let (state, _) = self.poll().await?;
        Ok(UpdateStatus::Checked(state))
    }

    /// Fetches the latest release and records it. Callers hold `check_lock`.
    async fn poll(&self) -> Result<(VersionState, Release), UpdateError> {
        let release = self
            .registry
            .fetch_latest_release(&self.config.repo)
            .await
            .inspect_err(|e| warn!("Update check for {} failed: {}", self.config.repo, e))?;

        let state = VersionState {
            current_version: self.current_version(),
            latest_version: release.tag_name.clone(),
            update_date: Utc::now(),
            release_url: release.html_url.clone(),
        };

        info!(
            "Checked {}: current {}, latest {} ({:?})",
            self.config.repo,
            state.current_version,
            state.latest_version,
            state.compare()
        );

        self.cache.save(&state)?;
        *self.release.lock().unwrap_or_else(PoisonError::into_inner) = Some(release.clone());
        self.set_status(state.clone());

        Ok((state, release))
    }

    /// Runs [`Updater::check`] on a background task so the caller never
    /// blocks on the network.
    pub fn spawn_check(self: &Arc<Self>) -> JoinHandle<Result<UpdateStatus, UpdateError>> {
        let updater = Arc::clone(self);
        tokio::spawn(async move { updater.check(CheckMode::IfStale).await })
    }

    /// Downloads and installs the latest release when it is newer.
    ///
    /// With `force` the release is installed even when it is not newer or
    /// its tag is not a version.
    pub async fn update(&self, force: bool) -> Result<UpdateOutcome, UpdateError> {
        let _guard = self
            .update_lock
            .try_lock()
            .map_err(|_| UpdateError::UpdateInProgress)?;

        let (state, release) = {
            let _check = self.check_lock.lock().await;
            self.poll().await?
        };

        match state.compare() {
            CompareResult::Outdated => {}
            _ if force => info!("Forcing install of {}", state.latest_version),
            CompareResult::Latest | CompareResult::Newer => {
                info!("Already up to date ({})", state.current_version);
                return Ok(UpdateOutcome::UpToDate {
                    current: state.current_version,
                    latest: state.latest_version,
                });
            }
            CompareResult::Invalid => {
                return Err(UpdateError::NotComparable {
                    current: state.current_version,
                    latest: state.latest_version,
                });
            }
        }

        let archive = self
            .registry
            .download_archive(&self.config.repo, &release)
            .await?;

        let install_dir = self.config.install_dir.clone();
        let preserve = self.config.preserve.clone();
        let report =
            tokio::task::spawn_blocking(move || install_archive(&archive, &install_dir, &preserve))
                .await??;

        let installed = VersionState {
            current_version: state.latest_version.clone(),
            update_date: Utc::now(),
            ..state.clone()
        };
        *self
            .installed_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(installed.current_version.clone());
        self.set_status(installed.clone());
        // The new files are already in place
        if let Err(e) = self.cache.save(&installed) {
            warn!("Installed {} but failed to record it: {}", installed.current_version, e);
        }

        info!(
            "Updated {} from {} to {}; restart the host to load it",
            self.config.repo, state.current_version, state.latest_version
        );

        Ok(UpdateOutcome::Updated {
            from: state.current_version,
            to: state.latest_version,
            report,
        })
    }

    /// Deletes the side-file and any leftover staging or backup directories.
    ///
    /// Fails with [`UpdateError::UpdateInProgress`] while an update runs.
    pub fn cleanup(&self) -> Result<CleanupReport, UpdateError> {
        let _guard = self
            .update_lock
            .try_lock()
            .map_err(|_| UpdateError::UpdateInProgress)?;
        let side_file_removed = self.cache.remove()?;
        let leftovers_removed = cleanup_leftovers(&self.config.install_dir)?;
        *self.status.write().unwrap_or_else(PoisonError::into_inner) = None;

        Ok(CleanupReport {
            side_file_removed,
            leftovers_removed,
        })
    }

    /// Release page of the last checked release, or the repository's
    /// releases listing
    pub fn release_notes_url(&self) -> String {
        self.status()
            .state()
            .and_then(|state| state.release_url.clone())
            .unwrap_or_else(|| self.config.releases_page())
    }

    /// Release metadata from the last check in this session
    pub fn latest_release(&self) -> Option<Release> {
        self.release
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
