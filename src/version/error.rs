use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("No release found for {0}")]
    NotFound(String),

    #[error("API rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("Invalid response from registry: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Failed to access side-file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed side-file {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
