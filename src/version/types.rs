//! Common types for release tracking

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

use crate::version::semver::{CompareResult, compare_to_latest};

/// Repository identifier on the hosting platform (e.g. "kents00/KLicense")
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for RepoId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('/');
        match s.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(format!("expected <owner>/<name>, got {:?}", s)),
        }
    }
}

/// Metadata of a published release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub zipball_url: Option<String>,
    /// Release notes in markdown
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Release {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            name: None,
            html_url: None,
            zipball_url: None,
            body: None,
            published_at: None,
        }
    }
}

/// Contents of the version side-file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionState {
    pub current_version: String,
    pub latest_version: String,
    #[serde(deserialize_with = "deserialize_update_date")]
    pub update_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
}

impl VersionState {
    pub fn compare(&self) -> CompareResult {
        compare_to_latest(&self.current_version, &self.latest_version)
    }

    pub fn update_available(&self) -> bool {
        self.compare().update_available()
    }
}

/// Accepts RFC 3339 and the zone-less local timestamps
/// (`2024-06-01 12:00:00.123456`) written by older add-on releases.
fn deserialize_update_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_update_date(&raw)
        .ok_or_else(|| de::Error::custom(format!("invalid update_date {:?}", raw)))
}

fn parse_update_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|date| date.with_timezone(&Utc))
}

/// Outcome of an update check as seen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// No check has completed yet
    Unknown,
    Checked(VersionState),
}

impl UpdateStatus {
    pub fn state(&self) -> Option<&VersionState> {
        match self {
            UpdateStatus::Unknown => None,
            UpdateStatus::Checked(state) => Some(state),
        }
    }

    pub fn update_available(&self) -> bool {
        self.state().is_some_and(VersionState::update_available)
    }
}
