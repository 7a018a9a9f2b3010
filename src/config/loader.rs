// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file and return the raw `RawConfigFile`.
///
/// A missing file is not an error: the built-in defaults are returned, which
/// describe "build the project in the current directory". A file that exists
/// but fails to parse is an error.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !path.exists() {
        info!(config = ?path, "no config file found; using defaults");
        return Ok(RawConfigFile::default());
    }

    let contents = fs::read_to_string(path)?;
    let config: RawConfigFile = toml::from_str(&contents)?;
    debug!(config = ?path, "loaded config file");

    Ok(config)
}

/// Load a configuration file from path, validate it, and resolve all paths.
///
/// Relative paths inside the file are resolved against the directory that
/// contains it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw = load_from_path(path)?;
    ConfigFile::resolve(raw, &config_root_dir(path))
}

/// Directory relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/devloop.toml"),
///   that directory is used.
/// - A bare filename like "devloop.toml" falls back to the current working
///   directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
        _ => cwd,
    }
}
