// src/errors.rs

//! Crate-wide error type and helpers.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DevloopError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("failed to walk directory {path:?}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("file watch subscription failed: {0}")]
    Subscription(#[from] notify::Error),

    #[error("failed to watch {path:?}: {source}")]
    WatchPath {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("build failed ({status}):\n{stderr}{stdout}")]
    Build {
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("failed to start {what}: {source}")]
    ProcessStart {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("no free port available (preferred {preferred}): {source}")]
    PortExhaustion {
        preferred: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DevloopError {
    /// Build error from a finished compiler invocation. The two streams are
    /// kept apart since their relative order is not known.
    pub fn build(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Self {
        DevloopError::Build {
            status: status.to_string(),
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DevloopError>;
