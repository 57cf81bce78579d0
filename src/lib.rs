pub mod cli;
pub mod config;
pub mod error;
pub mod install;
pub mod log;
pub mod updater;
pub mod version;

pub use config::UpdaterConfig;
pub use error::UpdateError;
pub use updater::{CheckMode, UpdateOutcome, Updater};
