// Version management layer
// - cache.rs: JSON side-file with the last poll result
// - semver.rs: Release tag normalization and comparison
// - registry.rs: ReleaseRegistry trait definition
// - types.rs: Common types (RepoId, Release, VersionState)
// - registries/: Registry implementations
//   - github.rs: GitHub Releases API

pub mod cache;
pub mod error;
pub mod registries;
pub mod registry;
pub mod semver;
pub mod types;
