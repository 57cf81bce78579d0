//! Command-line front end standing in for host integration glue

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::{DEFAULT_REFRESH_INTERVAL, UpdaterConfig};
use crate::updater::{CheckMode, UpdateOutcome, Updater};
use crate::version::registries::github::DEFAULT_BASE_URL;
use crate::version::semver::CompareResult;
use crate::version::types::{RepoId, UpdateStatus};

#[derive(Debug, Parser)]
#[command(name = "addon-updater", version, about)]
pub struct Cli {
    /// Repository publishing the add-on, as <owner>/<name>
    #[arg(long, env = "ADDON_UPDATER_REPO")]
    pub repo: RepoId,

    /// Version embedded in the installed add-on
    #[arg(long)]
    pub current_version: String,

    /// Directory holding the add-on's files
    #[arg(long)]
    pub install_dir: PathBuf,

    #[arg(long, env = "ADDON_UPDATER_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Side-file location (defaults to the data directory)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Hours before a cached check is considered stale
    #[arg(long, default_value_t = DEFAULT_REFRESH_INTERVAL.as_secs() / 3600)]
    pub refresh_hours: u64,

    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Path inside the install directory to keep across updates (repeatable)
    #[arg(long = "preserve")]
    pub preserve: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check for a newer release
    Check {
        /// Ignore the cached result
        #[arg(long)]
        force: bool,
    },
    /// Download and install the latest release
    Update {
        /// Install even when the release is not newer
        #[arg(long)]
        force: bool,
    },
    /// Show the last recorded check without contacting the network
    Status,
    /// Remove the side-file and leftover staging directories
    Cleanup,
    /// Print the release notes URL
    Notes,
}

impl Cli {
    pub fn to_config(&self) -> UpdaterConfig {
        let mut config = UpdaterConfig::new(
            self.repo.clone(),
            self.current_version.clone(),
            self.install_dir.clone(),
        )
        .with_api_url(self.api_url.clone())
        .with_token(self.token.clone())
        .with_refresh_interval(Duration::from_secs(self.refresh_hours.saturating_mul(3600)))
        .with_request_timeout(Duration::from_secs(self.timeout_secs))
        .with_preserve(self.preserve.clone());

        if let Some(state_file) = &self.state_file {
            config = config.with_state_path(state_file.clone());
        }
        config
    }
}

fn describe(status: &UpdateStatus) -> String {
    let Some(state) = status.state() else {
        return "No update check recorded yet".to_string();
    };

    let verdict = match state.compare() {
        CompareResult::Latest => "You are already using the latest version".to_string(),
        CompareResult::Outdated => format!("A new version is available: {}", state.latest_version),
        CompareResult::Newer => format!(
            "Installed version is ahead of the latest release {}",
            state.latest_version
        ),
        CompareResult::Invalid => format!(
            "Latest release tag {:?} is not a version",
            state.latest_version
        ),
    };

    format!(
        "{} (installed {}, checked {})",
        verdict,
        state.current_version,
        state.update_date.format("%Y-%m-%d %H:%M:%S UTC")
    )
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let updater = Updater::github(cli.to_config())?;
    info!("Running {:?} for {}", cli.command, cli.repo);

    match cli.command {
        Command::Check { force } => {
            let mode = if force {
                CheckMode::Force
            } else {
                CheckMode::IfStale
            };
            let status = updater.check(mode).await?;
            println!("{}", describe(&status));
        }
        Command::Update { force } => match updater.update(force).await? {
            UpdateOutcome::Updated { from, to, report } => {
                println!(
                    "Updated {} -> {} ({} files). Restart the host application to apply changes.",
                    from, to, report.extract.files
                );
                if let Some(backup) = report.replace.leftover_backup {
                    println!(
                        "Previous files could not be removed yet: {}",
                        backup.display()
                    );
                }
            }
            UpdateOutcome::UpToDate { current, .. } => {
                println!("You are already using the latest version ({}).", current);
            }
        },
        Command::Status => println!("{}", describe(&updater.status())),
        Command::Cleanup => {
            let report = updater.cleanup()?;
            println!(
                "Removed side-file: {}, leftover directories: {}",
                report.side_file_removed, report.leftovers_removed
            );
        }
        Command::Notes => println!("{}", updater.release_notes_url()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::types::VersionState;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec![
            "addon-updater",
            "--repo",
            "kents00/KLicense",
            "--current-version",
            "1.3.11",
            "--install-dir",
            "/addons/KLicense",
        ];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_check_with_defaults() {
        let cli = parse(&["check"]);

        assert_eq!(cli.repo, RepoId::new("kents00", "KLicense"));
        assert!(matches!(cli.command, Command::Check { force: false }));

        let config = cli.to_config();
        assert_eq!(config.refresh_interval, DEFAULT_REFRESH_INTERVAL);
        assert_eq!(config.install_dir, PathBuf::from("/addons/KLicense"));
    }

    #[test]
    fn to_config_applies_overrides() {
        let cli = parse(&[
            "--state-file",
            "/tmp/state.json",
            "--refresh-hours",
            "1",
            "--preserve",
            "prefs.json",
            "--preserve",
            "presets",
            "update",
            "--force",
        ]);

        assert!(matches!(cli.command, Command::Update { force: true }));
        let config = cli.to_config();
        assert_eq!(config.state_path, PathBuf::from("/tmp/state.json"));
        assert_eq!(config.refresh_interval, Duration::from_secs(3600));
        assert_eq!(
            config.preserve,
            vec![PathBuf::from("prefs.json"), PathBuf::from("presets")]
        );
    }

    #[test]
    fn to_config_saturates_huge_refresh_interval() {
        let cli = parse(&["--refresh-hours", "18446744073709551615", "check"]);

        let config = cli.to_config();
        assert_eq!(config.refresh_interval, Duration::from_secs(u64::MAX));
    }

    #[test]
    fn rejects_malformed_repo() {
        let result = Cli::try_parse_from([
            "addon-updater",
            "--repo",
            "KLicense",
            "--current-version",
            "1.0.0",
            "--install-dir",
            "/tmp/k",
            "status",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn describe_reports_available_update() {
        let status = UpdateStatus::Checked(VersionState {
            current_version: "1.3.11".to_string(),
            latest_version: "v1.4.0".to_string(),
            update_date: "2024-06-01T12:00:00Z".parse().unwrap(),
            release_url: None,
        });

        assert_eq!(
            describe(&status),
            "A new version is available: v1.4.0 (installed 1.3.11, checked 2024-06-01 12:00:00 UTC)"
        );
    }

    #[test]
    fn describe_reports_missing_check() {
        assert_eq!(describe(&UpdateStatus::Unknown), "No update check recorded yet");
    }
}
