//! Release tag normalization and version comparison

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;

/// Matches tags such as `1.2.3`, `v1.2`, `V2` or `1.2.3-beta.1`
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[vV]?(\d+)(?:\.(\d+))?(?:\.(\d+))?(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$")
        .expect("tag pattern is valid")
});

/// Result of comparing the running version against the latest release
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareResult {
    /// Running version is the latest release
    Latest,
    /// A newer release is available
    Outdated,
    /// Running version is ahead of the latest release (e.g. a dev build)
    Newer,
    /// At least one side is not a version and the strings differ
    Invalid,
}

impl CompareResult {
    pub fn update_available(self) -> bool {
        self == CompareResult::Outdated
    }
}

/// Parses a release tag into a semantic version.
///
/// Leading `v`/`V` is stripped and missing minor/patch components are
/// padded with zeros, so `v1.3` becomes `1.3.0`.
pub fn normalize_tag(tag: &str) -> Option<Version> {
    let caps = TAG_PATTERN.captures(tag.trim())?;

    let major = caps.get(1)?.as_str();
    let minor = caps.get(2).map_or("0", |m| m.as_str());
    let patch = caps.get(3).map_or("0", |m| m.as_str());
    let pre = caps.get(4).map_or("", |m| m.as_str());
    let build = caps.get(5).map_or("", |m| m.as_str());

    Version::parse(&format!("{major}.{minor}.{patch}{pre}{build}")).ok()
}

/// Compares the running version with the latest release tag.
///
/// Semantic ordering is used when both sides parse. Otherwise only exact
/// string equality is meaningful.
pub fn compare_to_latest(current: &str, latest: &str) -> CompareResult {
    match (normalize_tag(current), normalize_tag(latest)) {
        (Some(current), Some(latest)) => match current.cmp_precedence(&latest) {
            std::cmp::Ordering::Less => CompareResult::Outdated,
            std::cmp::Ordering::Equal => CompareResult::Latest,
            std::cmp::Ordering::Greater => CompareResult::Newer,
        },
        _ if current.trim() == latest.trim() => CompareResult::Latest,
        _ => CompareResult::Invalid,
    }
}
