// src/config/mod.rs

//! Loading, validating and resolving `devloop.toml`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{ConfigFile, RawConfigFile, ToolchainSection};
