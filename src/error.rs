use thiserror::Error;

use crate::config::ConfigError;
use crate::install::InstallError;
use crate::version::error::{RegistryError, StateError};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to fetch release: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to persist update state: {0}")]
    State(#[from] StateError),

    #[error("Failed to install update: {0}")]
    Install(#[from] InstallError),

    #[error("Release tag {latest:?} cannot be compared with version {current:?}")]
    NotComparable { current: String, latest: String },

    #[error("An update is already in progress")]
    UpdateInProgress,

    #[error("Install task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
