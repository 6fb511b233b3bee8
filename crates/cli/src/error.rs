//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The configuration file does not exist.
    #[error("config file not found at {path}. Create it or pass --config")]
    ConfigNotFound { path: PathBuf },

    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `run` was invoked without any input.
    #[error("no input: pass it as an argument or set run.user_input")]
    MissingInput,

    /// A headless turn did not produce an answer.
    #[error("turn failed: {0}")]
    TurnFailed(String),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
